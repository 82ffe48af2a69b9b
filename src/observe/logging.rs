//! Logging bootstrap for embedding applications.
//!
//! The engine itself only emits `tracing` events; hosts that do not bring
//! their own subscriber can install this one. `RUST_LOG` overrides the
//! default filter. Safe to call more than once.

use tracing_subscriber::EnvFilter;

pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
