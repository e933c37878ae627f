//! HTTP submission of a single composed event.
//!
//! The [`HttpSubmitter`] performs one request/response cycle against the
//! collection API and classifies the result:
//!
//! ```text
//! POST {base_url}/{api_version}/projects/{project_key}/events/{collection}
//!
//! 201                    -> Accepted
//! any other status       -> Rejected { status, response_body }
//! connect/timeout/DNS/IO -> TransportFailure { diagnostic }
//! ```
//!
//! There are no retries here. Retrying is left to whoever owns the callback.

use crate::dispatch::Submission;
use crate::{API_VERSION, SERVER_ADDRESS};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use std::error::Error as StdError;
use std::time::Duration;
use tracing::debug;

/// Default timeout for collection requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The classified result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The API answered 201 and persisted the event
    Accepted,

    /// The API answered with any other status
    Rejected { status: u16, response_body: String },

    /// The request never produced a response
    TransportFailure { diagnostic: String },
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted)
    }

    /// The text handed to a failure callback: the response body for
    /// rejections, the rendered error for transport failures.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::Accepted => None,
            SubmissionOutcome::Rejected { response_body, .. } => Some(response_body),
            SubmissionOutcome::TransportFailure { diagnostic } => Some(diagnostic),
        }
    }
}

/// Performs the request for one submission.
///
/// The dispatch pool is generic over this trait so tests can drive it
/// without a network.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit_one(&self, submission: &Submission) -> SubmissionOutcome;
}

/// Submitter backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    /// HTTP client (reused for connection pooling)
    client: Client,

    base_url: String,

    api_version: String,

    timeout: Duration,
}

impl HttpSubmitter {
    /// Create a submitter targeting the given server address
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_version: API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the API version path segment
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Set a custom request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the collection endpoint. Path segments are percent-encoded.
    pub fn endpoint(&self, project_key: &str, collection: &str) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| format!("invalid base url '{}': {}", self.base_url, e))?;

        url.path_segments_mut()
            .map_err(|_| format!("base url '{}' cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend([
                self.api_version.as_str(),
                "projects",
                project_key,
                "events",
                collection,
            ]);

        Ok(url)
    }

    async fn classify(response: reqwest::Response) -> SubmissionOutcome {
        let status = response.status();

        if status == StatusCode::CREATED {
            return SubmissionOutcome::Accepted;
        }

        let response_body = response.text().await.unwrap_or_default();
        SubmissionOutcome::Rejected {
            status: status.as_u16(),
            response_body,
        }
    }
}

impl Default for HttpSubmitter {
    fn default() -> Self {
        Self::new(SERVER_ADDRESS)
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit_one(&self, submission: &Submission) -> SubmissionOutcome {
        let identity = &submission.identity;

        let url = match self.endpoint(identity.project_key(), &submission.collection) {
            Ok(url) => url,
            Err(diagnostic) => return SubmissionOutcome::TransportFailure { diagnostic },
        };

        let body = match submission.payload.to_json() {
            Ok(body) => body,
            Err(e) => {
                return SubmissionOutcome::TransportFailure {
                    diagnostic: format!("failed to encode event: {}", e),
                }
            }
        };

        debug!(
            url = %url,
            collection = %submission.collection,
            bytes = body.len(),
            "Sending event"
        );

        let result = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, identity.api_key())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) => Self::classify(response).await,
            Err(e) => SubmissionOutcome::TransportFailure {
                diagnostic: render_error_chain(&e),
            },
        }
    }
}

/// Render an error and its sources on one line.
pub(crate) fn render_error_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
