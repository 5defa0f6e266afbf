//! Tracing setup helpers.
//!
//! The engine instruments itself with `tracing`; this module wires a
//! default subscriber for binaries and tests that have not installed
//! their own. Filtering follows `RUST_LOG`.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a fmt subscriber with `RUST_LOG`-driven filtering.
///
/// Idempotent, and a no-op when another subscriber is already installed.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    });
}
