//! Optional process-wide default client.
//!
//! Nothing in the client, composer or pool reads from here; it only saves
//! callers from threading a [`HatariClient`] through their code.
//!
//! ```rust,ignore
//! hatari::registry::initialize("project_key", "api_key")?;
//! hatari::registry::client()?.add_event("purchases", &event)?;
//! ```

use crate::client::HatariClient;
use crate::error::{HatariError, HatariResult};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

static DEFAULT_CLIENT: RwLock<Option<Arc<HatariClient>>> = RwLock::new(None);

/// Create a client on the shared pool and make it the default, replacing
/// any previous default.
pub fn initialize(
    project_key: impl Into<String>,
    api_key: impl Into<String>,
) -> HatariResult<Arc<HatariClient>> {
    let client = HatariClient::new(project_key, api_key)?;
    Ok(install(client))
}

/// Make an already built client the default.
pub fn install(client: HatariClient) -> Arc<HatariClient> {
    let client = Arc::new(client);
    info!(project_key = %client.project_key(), "Default client installed");
    *DEFAULT_CLIENT
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(client.clone());
    client
}

/// The default client.
pub fn client() -> HatariResult<Arc<HatariClient>> {
    DEFAULT_CLIENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(HatariError::NotInitialized)
}

/// Remove the default client.
pub fn reset() {
    *DEFAULT_CLIENT
        .write()
        .unwrap_or_else(PoisonError::into_inner) = None;
}
