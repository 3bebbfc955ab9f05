//! Tracing setup for launcher progress output.
//!
//! Unlike a dev-only trace, the launcher's `info` events are the progress
//! report operators read in their platform's log view, so the default filter
//! keeps them visible.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "launcher=info";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `launcher=info` if unset or invalid.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=launcher=debug launcher start
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
