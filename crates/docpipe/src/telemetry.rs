//! Tracing subscriber setup.
//!
//! `log` records from infrastructure code are bridged into `tracing`, so a
//! single subscriber sees both.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::error::{DocpipeError, Result};

/// Builds the filter: `RUST_LOG` when set and valid, else the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| {
        DocpipeError::Telemetry(format!("invalid log level '{}': {}", config.level, e))
    })
}

/// Installs the global subscriber. Call once, early in `main`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    tracing_log::LogTracer::init()
        .map_err(|e| DocpipeError::Telemetry(format!("log bridge: {}", e)))?;

    let filter = env_filter(config)?;

    let json_layer = config
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let plain_layer = (!config.json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let subscriber = Registry::default()
        .with(filter)
        .with(json_layer)
        .with(plain_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| DocpipeError::Telemetry(e.to_string()))
}
