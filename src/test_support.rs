//! Shared fixtures for unit tests: a fake collection API, a scripted
//! submitter and a warning counter for log assertions.

use crate::client::ClientIdentity;
use crate::compose::{compose, GlobalProperties};
use crate::dispatch::Submission;
use crate::event::event_from_json;
use crate::logging::LOG_TARGET;
use crate::submit::{SubmissionOutcome, Submitter};
use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub(crate) const TEST_PROJECT_KEY: &str = "test-project";
pub(crate) const TEST_API_KEY: &str = "test-api-key";

pub(crate) fn identity() -> Arc<ClientIdentity> {
    Arc::new(ClientIdentity::new(TEST_PROJECT_KEY, TEST_API_KEY).unwrap())
}

/// A submission for `event` (a JSON object) composed without global properties.
pub(crate) fn submission(collection: &str, event: Value) -> Submission {
    let event = event_from_json(event).unwrap();
    Submission {
        identity: identity(),
        collection: collection.to_string(),
        payload: compose(&GlobalProperties::new(), collection, &event, None),
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// An in-process collection API that answers every request with a fixed
/// status and body.
pub(crate) struct FakeCollector {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeCollector {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a [`FakeCollector`] on an ephemeral port of the current runtime.
pub(crate) async fn spawn_collector(status: StatusCode, body: &'static str) -> FakeCollector {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();

    let app = axum::Router::new().fallback(
        move |method: Method, uri: Uri, headers: HeaderMap, text: String| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(RecordedRequest {
                    method: method.to_string(),
                    path: uri.path().to_string(),
                    headers,
                    body: serde_json::from_str(&text).unwrap_or(Value::Null),
                });
                (status, body)
            }
        },
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeCollector {
        base_url: format!("http://{}", addr),
        requests,
    }
}

/// Submitter that answers from a function of the submission, optionally
/// after a delay, and counts calls.
pub(crate) struct ScriptedSubmitter {
    script: fn(&Submission) -> SubmissionOutcome,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedSubmitter {
    pub fn new(script: fn(&Submission) -> SubmissionOutcome) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn accepting() -> Self {
        Self::new(|_| SubmissionOutcome::Accepted)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Submitter for ScriptedSubmitter {
    async fn submit_one(&self, submission: &Submission) -> SubmissionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(submission)
    }
}

/// Layer counting `WARN` events whose target starts with a prefix
/// (`hatari` by default).
#[derive(Clone)]
pub(crate) struct WarningCounter {
    target: &'static str,
    count: Arc<AtomicUsize>,
}

impl Default for WarningCounter {
    fn default() -> Self {
        Self::for_target(LOG_TARGET)
    }
}

impl WarningCounter {
    pub fn for_target(target: &'static str) -> Self {
        Self {
            target,
            count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() == Level::WARN && metadata.target().starts_with(self.target) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}
