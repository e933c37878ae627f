//! Error types for the Hatari client.
//!
//! Only synchronous failures live here. Delivery failures happen after
//! [`add_event`](crate::HatariClient::add_event) has returned, so they are
//! reported through [`SubmissionOutcome`](crate::SubmissionOutcome) and the
//! caller's [`UploadCallback`](crate::UploadCallback) instead.

use thiserror::Error;

/// Errors returned synchronously by the client.
#[derive(Debug, Error)]
pub enum HatariError {
    /// The client or pool was built with invalid settings (empty keys, zero workers)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The collection name failed validation
    #[error("invalid event collection: {0}")]
    InvalidCollection(String),

    /// The event failed validation
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The default client was requested before [`crate::registry::initialize`]
    #[error("the default client has not been initialized, call registry::initialize() first")]
    NotInitialized,

    /// The dispatch runtime could not be started
    #[error("failed to start dispatch runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// The configuration file could not be read or parsed
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

/// Result type for client operations
pub type HatariResult<T> = Result<T, HatariError>;
