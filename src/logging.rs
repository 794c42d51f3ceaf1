//! Process diagnostics.
//!
//! Diagnostics go through `tracing` to stderr, filtered by `RUST_LOG`
//! (default `info`). Request log lines are separate and go through
//! [`RequestLogger`](crate::logger::RequestLogger).

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. Later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
