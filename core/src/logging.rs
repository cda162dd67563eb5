// Logging bootstrap
//
// fmt subscriber filtered by RUST_LOG; safe to call more than once.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,greenhealth_core=info";

/// Install the global fmt subscriber. Returns false if one was already installed.
pub fn init() -> bool {
    init_with_default(DEFAULT_FILTER)
}

pub fn init_with_default(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
