//! # Structured Logging
//!
//! Logging setup on the tracing ecosystem: JSON output for production,
//! pretty output for development.

use crate::config::ObservabilityConfig;
use crate::errors::{OkapiError, Result};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGING_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Initialize structured logging based on configuration
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = parse_env_filter(&config.log_level)?;
    LOGGING_INITIALIZED.get_or_try_init(|| configure_logging(config, env_filter)).map(|_| ())
}

fn configure_logging(config: &ObservabilityConfig, env_filter: EnvFilter) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json_logging {
        registry
            .with(fmt::layer().json().flatten_event(true).with_current_span(true))
            .try_init()
            .map_err(|e| OkapiError::config(format!("Failed to initialize logging: {}", e)))?;
    } else {
        registry
            .with(fmt::layer().with_target(true))
            .try_init()
            .map_err(|e| OkapiError::config(format!("Failed to initialize logging: {}", e)))?;
    }
    Ok(())
}

fn parse_env_filter(level: &str) -> Result<EnvFilter> {
    let normalized = level.trim();
    match normalized.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => {
            return Err(OkapiError::config(format!(
                "Invalid log level '{}': must be one of trace, debug, info, warn, error",
                level
            )));
        }
    }
    EnvFilter::try_new(normalized)
        .map_err(|e| OkapiError::config(format!("Invalid log level '{}': {}", level, e)))
}
