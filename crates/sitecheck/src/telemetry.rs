//! Logging setup.
//!
//! Library code logs through the `log` facade and opens `tracing` spans.
//! [`init_logging`] routes both into one `tracing-subscriber` registry.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::SitecheckError;

/// Parses a filter directive such as `info` or `sitecheck=debug,warn`.
pub fn filter_from_level(level: &str) -> Result<EnvFilter, SitecheckError> {
    EnvFilter::try_new(level)
        .map_err(|e| SitecheckError::Telemetry(format!("Invalid log filter '{}': {}", level, e)))
}

/// `RUST_LOG` when set and valid, the configured level otherwise.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, SitecheckError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => filter_from_level(&config.level),
    }
}

/// Installs the global subscriber and the `log` bridge. Fails instead of
/// panicking when logging was already initialised.
pub fn init_logging(config: &LoggingConfig) -> Result<(), SitecheckError> {
    let filter = build_filter(config)?;

    tracing_log::LogTracer::init()
        .map_err(|e| SitecheckError::Telemetry(format!("Failed to bridge log records: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
    } else {
        tracing::subscriber::set_global_default(registry.with(fmt::layer()))
    };
    installed.map_err(|e| SitecheckError::Telemetry(format!("Failed to install subscriber: {}", e)))?;

    log::debug!("Logging initialised (json: {})", config.json);
    Ok(())
}
