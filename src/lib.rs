//! # Hatari client
//!
//! Collects structured events and ships them to the Hatari collection API
//! without blocking the caller.
//!
//! ## Architecture
//!
//! ```text
//! Caller -> Validator -> Composer -> DispatchPool (async) -> Submitter -> Callback
//! ```
//!
//! ## Modules
//!
//! - [`event`]: Event value model and the composed payload
//! - [`validation`]: Collection and event validation rules
//! - [`compose`]: Metadata and global-property enrichment
//! - [`dispatch`]: Fixed-size worker pool
//! - [`submit`]: HTTP submission and outcome classification
//! - [`callback`]: Routing outcomes to caller callbacks
//! - [`client`]: The caller-facing [`HatariClient`]
//! - [`registry`]: Optional default client
//! - [`config`]: TOML configuration
//! - [`logging`]: Diagnostic output switch

pub mod callback;
pub mod client;
pub mod compose;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod logging;
pub mod registry;
pub mod submit;
pub mod validation;

#[cfg(test)]
mod test_support;

// Re-export commonly used types at crate root
pub use callback::UploadCallback;
pub use client::{ClientIdentity, HatariClient};
pub use compose::{GlobalProperties, GlobalPropertiesEvaluator};
pub use config::HatariConfig;
pub use dispatch::DispatchPool;
pub use error::{HatariError, HatariResult};
pub use event::{event_from_json, ComposedPayload, Event, PropertyValue};
pub use submit::{HttpSubmitter, SubmissionOutcome, Submitter};

/// Default address of the collection API
pub const SERVER_ADDRESS: &str = "https://api.hatario.io";

/// Default API version path segment
pub const API_VERSION: &str = "1";

/// Reserved top-level key holding the metadata block
pub const METADATA_KEY: &str = "hatari";

/// Metadata entry holding the event timestamp
pub const TIMESTAMP_KEY: &str = "timestamp";
