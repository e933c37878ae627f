//! Hatari command-line sender.
//!
//! Sends one event and waits for the collection API's answer.
//!
//! ```text
//! hatari <collection> '<json object>'
//! ```
//!
//! ## Configuration
//!
//! - `HATARI_CONFIG`: path to the TOML config (default: `config/hatari.toml`)
//! - `HATARI_PROJECT_KEY` / `HATARI_API_KEY`: used when the config file has
//!   no credentials
//! - `RUST_LOG`: log filter (default: `hatari=debug,info`)

use hatari::{event_from_json, logging, HatariConfig, UploadCallback};
use std::env;
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{error, info};

/// How long to wait for the callback after the request timeout has passed
const CALLBACK_GRACE: Duration = Duration::from_secs(5);

fn usage() -> ExitCode {
    eprintln!("usage: hatari <collection> '<json object>'");
    ExitCode::from(2)
}

fn load_config() -> Result<HatariConfig, Box<dyn std::error::Error>> {
    let mut config = HatariConfig::load()?;

    if config.credentials.project_key.is_none() {
        config.credentials.project_key = env::var("HATARI_PROJECT_KEY").ok();
    }
    if config.credentials.api_key.is_none() {
        config.credentials.api_key = env::var("HATARI_API_KEY").ok();
    }

    Ok(config)
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logging::init();
    logging::enable();

    let args: Vec<String> = env::args().skip(1).collect();
    let [collection, raw_event] = args.as_slice() else {
        return usage();
    };

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let event = match serde_json::from_str(raw_event)
        .map_err(|e| e.to_string())
        .and_then(|value| event_from_json(value).map_err(|e| e.to_string()))
    {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Event is not a valid JSON object");
            return ExitCode::FAILURE;
        }
    };

    let client = match config.build_client() {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to create client");
            return ExitCode::FAILURE;
        }
    };

    let (tx, rx) = mpsc::channel();
    let callback = UploadCallback::from_result(move |result| {
        let _ = tx.send(result);
    });

    if let Err(e) = client.add_event_with(collection, &event, None, Some(callback)) {
        error!(error = %e, "Event was not submitted");
        return ExitCode::FAILURE;
    }

    let wait = Duration::from_millis(config.api.timeout_ms) + CALLBACK_GRACE;
    match rx.recv_timeout(wait) {
        Ok(Ok(())) => {
            info!(collection = %collection, "Event stored");
            ExitCode::SUCCESS
        }
        Ok(Err(body)) => {
            error!(collection = %collection, response = %body, "Event was not stored");
            ExitCode::FAILURE
        }
        Err(_) => {
            error!(collection = %collection, "Timed out waiting for the collection API");
            ExitCode::FAILURE
        }
    }
}
