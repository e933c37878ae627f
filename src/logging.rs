//! Diagnostic logging.
//!
//! The crate reports validation and delivery problems through `tracing`
//! under the `hatari` target. Those events are muted by default; call
//! [`enable`] to see them. The switch is process-wide and can be flipped at
//! any time.
//!
//! Applications that already install a subscriber only need
//! [`enable`]/[`disable`] together with a layer built by
//! [`diagnostics_filter`]. [`init`] installs a ready-made `fmt` subscriber.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::Metadata;
use tracing_subscriber::filter::{dynamic_filter_fn, DynFilterFn};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Target prefix of every event this crate emits
pub const LOG_TARGET: &str = "hatari";

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Turn the crate's diagnostic output on
pub fn enable() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Turn the crate's diagnostic output off
pub fn disable() {
    ENABLED.store(false, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

fn allows<S>(metadata: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
    !metadata.target().starts_with(LOG_TARGET) || is_enabled()
}

/// A per-layer filter that drops this crate's events while diagnostics
/// are disabled and passes everything else through.
///
/// The switch is consulted on every event, so callsites are never cached
/// as always-on or always-off.
pub fn diagnostics_filter<S>() -> DynFilterFn<S> {
    dynamic_filter_fn(allows::<S> as fn(&Metadata<'_>, &Context<'_, S>) -> bool)
}

/// Install a global `fmt` subscriber honouring `RUST_LOG` (default
/// `hatari=debug,info`) and the diagnostic switch.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}=debug,info", LOG_TARGET)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_filter(diagnostics_filter()))
        .try_init()
        .is_ok()
}
