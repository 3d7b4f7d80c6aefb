//! # Observability Infrastructure
//!
//! Structured logging and Prometheus metrics for the gateway.

mod logging;
mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;

use crate::config::ObservabilityConfig;
use crate::errors::Result;

/// Initialize logging and metrics from configuration
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;
    init_metrics(config)?;
    Ok(())
}
