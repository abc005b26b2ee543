//! Structured logging.
//!
//! # Responsibilities
//! - Install a `tracing` subscriber for hosts that want the default setup
//! - Honour `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - The library only emits events; installing a subscriber is opt-in
//! - A second `init` is a no-op instead of a panic

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install a registry with an env filter and fmt layer.
///
/// Returns false if a global subscriber was already set.
pub fn init(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
