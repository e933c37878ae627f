//! The caller-facing client.
//!
//! A [`HatariClient`] holds the project identity and the global-property
//! enrichment, and ties validation, composition and dispatch together:
//!
//! ```text
//! add_event ─► validate ─► compose ─► DispatchPool::submit ─► (worker) ─► callback
//!   │             │
//!   └─ Err ◄──────┘   synchronous: nothing is queued on a validation error
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use hatari::{Event, HatariClient, UploadCallback};
//!
//! let client = HatariClient::new("project_key", "api_key")?;
//!
//! let mut event = Event::new();
//! event.insert("item".into(), "golden gadget".into());
//!
//! client.add_event_with(
//!     "purchases",
//!     &event,
//!     None,
//!     Some(UploadCallback::new(|| println!("stored"), |body| eprintln!("{}", body))),
//! )?;
//! ```

use crate::callback::UploadCallback;
use crate::compose::{compose, GlobalProperties, GlobalPropertiesEvaluator};
use crate::dispatch::{DispatchPool, DispatchTask, Submission};
use crate::error::{HatariError, HatariResult};
use crate::event::Event;
use crate::validation;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Project key and API key of a client. Both are non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    project_key: String,
    api_key: String,
}

impl ClientIdentity {
    pub fn new(project_key: impl Into<String>, api_key: impl Into<String>) -> HatariResult<Self> {
        let project_key = project_key.into();
        let api_key = api_key.into();

        if project_key.is_empty() {
            return Err(HatariError::Configuration(
                "invalid project key specified: must not be empty".into(),
            ));
        }
        if api_key.is_empty() {
            return Err(HatariError::Configuration(
                "invalid API key specified: must not be empty".into(),
            ));
        }

        Ok(Self {
            project_key,
            api_key,
        })
    }

    /// Namespace under which events are collected
    pub fn project_key(&self) -> &str {
        &self.project_key
    }

    /// Credential sent in the `Authorization` header
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("project_key", &self.project_key)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Collects events and ships them to the collection API.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct HatariClient {
    identity: Arc<ClientIdentity>,
    globals: RwLock<GlobalProperties>,
    pool: Arc<DispatchPool>,
}

impl HatariClient {
    /// Create a client that submits through the shared dispatch pool.
    pub fn new(project_key: impl Into<String>, api_key: impl Into<String>) -> HatariResult<Self> {
        let identity = ClientIdentity::new(project_key, api_key)?;
        Ok(Self::with_pool(identity, DispatchPool::shared()?))
    }

    /// Create a client that submits through a specific pool.
    pub fn with_pool(identity: ClientIdentity, pool: Arc<DispatchPool>) -> Self {
        Self {
            identity: Arc::new(identity),
            globals: RwLock::new(GlobalProperties::new()),
            pool,
        }
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn project_key(&self) -> &str {
        self.identity.project_key()
    }

    pub fn api_key(&self) -> &str {
        self.identity.api_key()
    }

    /// Set the static global properties merged into every event, replacing
    /// any previous mapping.
    pub fn set_global_properties(&self, properties: Event) {
        self.write_globals().set_static(Some(properties));
    }

    pub fn clear_global_properties(&self) {
        self.write_globals().set_static(None);
    }

    pub fn global_properties(&self) -> Option<Event> {
        self.read_globals().static_properties().cloned()
    }

    /// Set the evaluator invoked for every event with its collection name,
    /// replacing any previous evaluator. Its output takes precedence over
    /// the static global properties; the event's own properties take
    /// precedence over both.
    pub fn set_global_properties_evaluator<E>(&self, evaluator: E)
    where
        E: GlobalPropertiesEvaluator + 'static,
    {
        self.write_globals().set_evaluator(Some(Arc::new(evaluator)));
    }

    pub fn clear_global_properties_evaluator(&self) {
        self.write_globals().set_evaluator(None);
    }

    pub fn global_properties_evaluator(&self) -> Option<Arc<dyn GlobalPropertiesEvaluator>> {
        self.read_globals().evaluator()
    }

    /// Add an event to `collection` without overrides or a callback.
    pub fn add_event(&self, collection: &str, event: &Event) -> HatariResult<()> {
        self.add_event_with(collection, event, None, None)
    }

    /// Validate, compose and enqueue an event.
    ///
    /// Returns once the event is queued. Validation errors are returned
    /// here and nothing is queued; delivery results only reach `callback`
    /// (or the diagnostic log when there is none).
    ///
    /// `overrides` replaces the default `hatari` metadata block, e.g. to
    /// supply an explicit `timestamp`.
    pub fn add_event_with(
        &self,
        collection: &str,
        event: &Event,
        overrides: Option<Event>,
        callback: Option<UploadCallback>,
    ) -> HatariResult<()> {
        if let Err(e) = validation::validate(collection, event) {
            warn!(collection = %collection, error = %e, "Event was not added");
            return Err(e);
        }

        debug!(
            project_key = %self.identity.project_key(),
            collection = %collection,
            "Adding event to collection"
        );

        // Snapshot so the evaluator runs without holding the lock
        let globals = self.read_globals().clone();
        let payload = compose(&globals, collection, event, overrides);

        self.pool.submit(DispatchTask::new(
            Submission {
                identity: self.identity.clone(),
                collection: collection.to_string(),
                payload,
            },
            callback,
        ));

        Ok(())
    }

    fn read_globals(&self) -> std::sync::RwLockReadGuard<'_, GlobalProperties> {
        self.globals.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_globals(&self) -> std::sync::RwLockWriteGuard<'_, GlobalProperties> {
        self.globals.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for HatariClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HatariClient")
            .field("identity", &self.identity)
            .field("globals", &*self.read_globals())
            .field("pool", &self.pool)
            .finish()
    }
}
