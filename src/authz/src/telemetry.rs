//! Tracing subscriber setup for hosts embedding the authorization core

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a fmt subscriber filtered by `RUST_LOG` (default: info)
///
/// Returns `false` when a global subscriber is already set.
pub fn init_tracing() -> bool {
    init_tracing_with("info")
}

pub fn init_tracing_with(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
