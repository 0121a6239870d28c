//! Tracing initialization hooks.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber with env filter.
///
/// Use RUST_LOG to configure, e.g.:
/// RUST_LOG=debug,tower_http=info,sqlx=warn
pub fn init() {
    let fmt_layer = fmt::layer()
        .with_target(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
