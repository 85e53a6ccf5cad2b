//! Structured logging.
//!
//! # Responsibilities
//! - Install the process-wide `tracing` subscriber
//! - Configure log level from config, overridable by `RUST_LOG`
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging
//! - Installation is fallible and never panics; a host that already owns a
//!   subscriber keeps it

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install a fmt subscriber filtered by `RUST_LOG` or, failing that, the
/// configured level.
///
/// Returns `false` when a global subscriber was already set.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(level = %config.level, "Logging initialized");
    }
    installed
}

fn default_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::new(format!(
        "{}={}",
        env!("CARGO_CRATE_NAME"),
        config.level.to_ascii_lowercase()
    ))
}
