//! Tracing setup for the command line tool.
//!
//! Library code logs through both `tracing` and `log`; the `log` records are
//! forwarded into the same subscriber.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LogConfig;

/// Builds the filter: `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber.
///
/// Returns an error when a subscriber or `log` logger is already installed.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    tracing_log::LogTracer::init()?;

    let registry = Registry::default().with(env_filter(config));
    if config.json {
        tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_current_span(true)),
        )?;
    } else {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().with_target(false)))?;
    }

    tracing::debug!(level = %config.level, json = config.json, "logging initialised");
    Ok(())
}
