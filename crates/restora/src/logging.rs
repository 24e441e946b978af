//! Process-wide logging setup.
//!
//! `log` records from this crate and its dependencies are bridged into
//! `tracing`, so both end up in the same subscriber.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::RestoraError;

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, RestoraError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| RestoraError::Logging(format!("invalid level '{}': {}", config.level, e))),
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), RestoraError> {
    let filter = build_filter(config)?;

    let installed = match config.format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            Registry::default()
                .with(filter)
                .with(fmt::layer().with_target(true)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            Registry::default()
                .with(filter)
                .with(fmt::layer().json().with_current_span(true)),
        ),
    };
    installed.map_err(|e| RestoraError::Logging(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| RestoraError::Logging(e.to_string()))?;

    log::info!("Logging initialized ({:?}, level '{}')", config.format, config.level);
    Ok(())
}
