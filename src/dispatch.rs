//! The dispatch pool.
//!
//! A fixed number of workers drain one FIFO queue of composed events. Each
//! worker takes the next task, runs it through the [`Submitter`] and routes
//! the outcome to the task's callback.
//!
//! ```text
//! add_event ──► queue (unbounded, FIFO) ──► worker 0 ─┐
//!   (returns                             ├─► worker 1 ─┼─► Submitter ─► route()
//!    at once)                            └─► worker N ─┘
//! ```
//!
//! The pool owns its own multi-threaded tokio runtime, so [`DispatchPool::submit`]
//! works from plain threads and from async code alike and never waits on
//! the network. Completion order across workers is not guaranteed.
//!
//! Dropping the last handle to a pool stops its workers; tasks still queued
//! at that point are discarded without a callback.

use crate::callback::{route, UploadCallback};
use crate::client::ClientIdentity;
use crate::error::{HatariError, HatariResult};
use crate::event::ComposedPayload;
use crate::submit::{HttpSubmitter, SubmissionOutcome, Submitter};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// Worker count of the shared pool
pub const DEFAULT_WORKERS: usize = 3;

static SHARED_POOL: OnceLock<Arc<DispatchPool>> = OnceLock::new();

/// Everything the submitter needs for one request.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Identity of the client that composed the event
    pub identity: Arc<ClientIdentity>,

    /// Target event collection
    pub collection: String,

    /// Outbound body
    pub payload: ComposedPayload,
}

/// A queued unit of work: a submission plus the caller's callback.
#[derive(Debug)]
pub struct DispatchTask {
    pub submission: Submission,
    pub callback: Option<UploadCallback>,
}

impl DispatchTask {
    pub fn new(submission: Submission, callback: Option<UploadCallback>) -> Self {
        Self {
            submission,
            callback,
        }
    }
}

type TaskQueue = Arc<Mutex<mpsc::UnboundedReceiver<DispatchTask>>>;

/// Fixed-size worker pool for event submissions.
pub struct DispatchPool {
    sender: mpsc::UnboundedSender<DispatchTask>,
    runtime: Option<Runtime>,
    workers: usize,
}

impl DispatchPool {
    /// Start a pool with `workers` workers submitting through `submitter`.
    pub fn new(workers: usize, submitter: Arc<dyn Submitter>) -> HatariResult<Self> {
        if workers == 0 {
            return Err(HatariError::Configuration(
                "dispatch pool needs at least one worker".into(),
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("hatari-dispatch")
            .enable_all()
            .build()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: TaskQueue = Arc::new(Mutex::new(receiver));

        for worker_id in 0..workers {
            runtime.spawn(run_worker(worker_id, queue.clone(), submitter.clone()));
        }

        info!(workers = workers, "Dispatch pool started");

        Ok(Self {
            sender,
            runtime: Some(runtime),
            workers,
        })
    }

    /// The process-wide pool, created on first use with
    /// [`DEFAULT_WORKERS`] workers and the default [`HttpSubmitter`].
    pub fn shared() -> HatariResult<Arc<Self>> {
        if let Some(pool) = SHARED_POOL.get() {
            return Ok(pool.clone());
        }

        let pool = Arc::new(Self::new(DEFAULT_WORKERS, Arc::new(HttpSubmitter::default()))?);
        Ok(SHARED_POOL.get_or_init(|| pool).clone())
    }

    /// Enqueue a task and return immediately.
    pub fn submit(&self, task: DispatchTask) {
        if let Err(mpsc::error::SendError(task)) = self.sender.send(task) {
            // Only reachable while the pool is being torn down
            route(
                &task.submission.collection,
                SubmissionOutcome::TransportFailure {
                    diagnostic: "dispatch pool is shut down".into(),
                },
                task.callback,
            );
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl fmt::Debug for DispatchPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchPool")
            .field("workers", &self.workers)
            .finish()
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            // Blocking shutdown would panic when dropped inside async code
            runtime.shutdown_background();
        }
    }
}

async fn run_worker(worker_id: usize, queue: TaskQueue, submitter: Arc<dyn Submitter>) {
    debug!(worker = worker_id, "Dispatch worker started");

    loop {
        let next = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };

        let Some(task) = next else {
            break;
        };

        let DispatchTask {
            submission,
            callback,
        } = task;

        debug!(
            worker = worker_id,
            collection = %submission.collection,
            "Processing event"
        );

        let outcome = submitter.submit_one(&submission).await;
        route(&submission.collection, outcome, callback);
    }

    debug!(worker = worker_id, "Dispatch worker stopped");
}
