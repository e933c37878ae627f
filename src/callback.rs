//! Callback routing.
//!
//! After a worker has a [`SubmissionOutcome`], [`route`] records it to the
//! diagnostic log and hands it to the caller's [`UploadCallback`], if any.
//!
//! ```text
//! Outcome            | Callback present        | No callback
//! -------------------|-------------------------|-----------------
//! Accepted           | success handler         | debug log
//! Rejected           | failure handler (body)  | warn log
//! TransportFailure   | failure handler (diag)  | warn log
//! ```
//!
//! Handlers run on the worker that produced the outcome, not on the thread
//! that submitted the event.

use crate::submit::SubmissionOutcome;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, warn};

type SuccessHandler = Box<dyn FnOnce() + Send>;
type FailureHandler = Box<dyn FnOnce(String) + Send>;
type ResultHandler = Box<dyn FnOnce(Result<(), String>) + Send>;

enum Handlers {
    Split {
        on_success: SuccessHandler,
        on_failure: FailureHandler,
    },
    Single(ResultHandler),
}

/// Notification for the asynchronous result of one submitted event.
///
/// Each handler is `FnOnce`: exactly one of them runs, exactly once.
///
/// ```rust,ignore
/// let callback = UploadCallback::new(
///     || println!("stored"),
///     |body| eprintln!("rejected: {}", body),
/// );
/// client.add_event_with("purchases", &event, None, Some(callback))?;
/// ```
pub struct UploadCallback {
    handlers: Handlers,
}

impl UploadCallback {
    /// Build a callback from a success handler and a failure handler.
    ///
    /// The failure handler receives the response body for rejected events
    /// or a rendered error for transport failures.
    pub fn new<S, F>(on_success: S, on_failure: F) -> Self
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(String) + Send + 'static,
    {
        Self {
            handlers: Handlers::Split {
                on_success: Box::new(on_success),
                on_failure: Box::new(on_failure),
            },
        }
    }

    /// Build a callback from a single handler taking the result.
    pub fn from_result<H>(handler: H) -> Self
    where
        H: FnOnce(Result<(), String>) + Send + 'static,
    {
        Self {
            handlers: Handlers::Single(Box::new(handler)),
        }
    }

    fn invoke(self, result: Result<(), String>) {
        match (self.handlers, result) {
            (Handlers::Split { on_success, .. }, Ok(())) => on_success(),
            (Handlers::Split { on_failure, .. }, Err(message)) => on_failure(message),
            (Handlers::Single(handler), result) => handler(result),
        }
    }
}

impl fmt::Debug for UploadCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.handlers {
            Handlers::Split { .. } => "split",
            Handlers::Single(_) => "single",
        };
        f.debug_struct("UploadCallback").field("handlers", &kind).finish()
    }
}

/// Record `outcome` and deliver it to `callback`.
///
/// A panicking handler is caught and logged so the worker keeps draining
/// the queue.
pub fn route(collection: &str, outcome: SubmissionOutcome, callback: Option<UploadCallback>) {
    let result = match outcome {
        SubmissionOutcome::Accepted => {
            debug!(collection = %collection, "Event accepted");
            Ok(())
        }
        SubmissionOutcome::Rejected {
            status,
            response_body,
        } => {
            warn!(
                collection = %collection,
                status = status,
                body = %response_body,
                "Event rejected, response code was not 201"
            );
            Err(response_body)
        }
        SubmissionOutcome::TransportFailure { diagnostic } => {
            warn!(
                collection = %collection,
                error = %diagnostic,
                "There was an error while sending the event"
            );
            Err(diagnostic)
        }
    };

    let Some(callback) = callback else {
        return;
    };

    if panic::catch_unwind(AssertUnwindSafe(|| callback.invoke(result))).is_err() {
        error!(collection = %collection, "Upload callback panicked");
    }
}
