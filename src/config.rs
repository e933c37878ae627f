//! Configuration module for the Hatari client.
//!
//! Loads configuration from TOML files with environment variable substitution.
//!
//! # Example
//!
//! ```toml
//! [credentials]
//! project_key = "${HATARI_PROJECT_KEY}"
//! api_key = "${HATARI_API_KEY}"
//!
//! [api]
//! base_url = "https://api.hatario.io"
//! api_version = "1"
//! timeout_ms = 30000
//!
//! [dispatch]
//! workers = 3
//!
//! [logging]
//! enabled = true
//! ```

use crate::client::{ClientIdentity, HatariClient};
use crate::dispatch::{DispatchPool, DEFAULT_WORKERS};
use crate::error::HatariResult;
use crate::submit::HttpSubmitter;
use crate::{logging, API_VERSION, SERVER_ADDRESS};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HatariConfig {
    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Project identity
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub project_key: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,
}

/// Collection API endpoint
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    SERVER_ADDRESS.to_string()
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_timeout_ms() -> u64 {
    30000
}

/// Worker pool sizing
#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

/// Diagnostic output switch
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl HatariConfig {
    /// Load configuration from the default path or HATARI_CONFIG env var.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            env::var("HATARI_CONFIG").unwrap_or_else(|_| "config/hatari.toml".to_string());

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            info!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        info!(path = %path.display(), "Loading configuration");

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;

        info!(
            base_url = %config.api.base_url,
            workers = config.dispatch.workers,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let content = substitute_env_vars(content);

        debug!("Parsing TOML configuration");
        let config: HatariConfig = toml::from_str(&content)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        let base_url = &self.api.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url '{}' must start with http:// or https://",
                base_url
            )));
        }

        if self.api.api_version.is_empty() {
            return Err(ConfigError::ValidationError(
                "api.api_version must not be empty".into(),
            ));
        }

        if self.api.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_ms must be greater than zero".into(),
            ));
        }

        if self.dispatch.workers == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.workers must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Build the HTTP submitter described by `[api]`.
    pub fn build_submitter(&self) -> HttpSubmitter {
        HttpSubmitter::new(&self.api.base_url)
            .with_api_version(&self.api.api_version)
            .with_timeout(Duration::from_millis(self.api.timeout_ms))
    }

    /// Start a dispatch pool described by `[api]` and `[dispatch]`.
    pub fn build_pool(&self) -> HatariResult<Arc<DispatchPool>> {
        let pool = DispatchPool::new(self.dispatch.workers, Arc::new(self.build_submitter()))?;
        Ok(Arc::new(pool))
    }

    /// Build a client from `[credentials]` on a fresh pool, and apply the
    /// `[logging]` switch.
    pub fn build_client(&self) -> HatariResult<HatariClient> {
        let project_key = required(&self.credentials.project_key, "credentials.project_key")?;
        let api_key = required(&self.credentials.api_key, "credentials.api_key")?;
        let identity = ClientIdentity::new(project_key, api_key)?;

        if self.logging.enabled {
            logging::enable();
        }

        Ok(HatariClient::with_pool(identity, self.build_pool()?))
    }
}

/// A credential that is present and had its placeholder substituted.
fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ConfigError> {
    match value.as_deref() {
        Some(v) if v.contains("${") => Err(ConfigError::MissingField(format!(
            "{} references an unset environment variable: {}",
            field, v
        ))),
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingField(field.to_string())),
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
    })
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(content: &str) -> String {
    env_var_pattern()
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    debug!(var = %var_name, "Environment variable not set, keeping placeholder");
                    caps[0].to_string()
                }
            }
        })
        .to_string()
}
