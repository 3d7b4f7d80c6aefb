//! # Metrics
//!
//! Prometheus metrics for the gateway: a request counter per tenant and
//! method, and a per-tenant-per-module duration histogram recorded around
//! every upstream exchange.

use crate::config::ObservabilityConfig;
use crate::errors::{OkapiError, Result};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter and register metric descriptions.
/// A disabled configuration is a no-op.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let Some(address) = config.metrics_bind_address() else {
        tracing::info!("Metrics exporter disabled");
        return Ok(());
    };
    let address: SocketAddr = address
        .parse()
        .map_err(|e| OkapiError::config(format!("Invalid metrics address: {}", e)))?;

    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| OkapiError::config(format!("Failed to install Prometheus exporter: {}", e)))?;

    describe_counter!(
        "okapi_proxy_requests_total",
        Unit::Count,
        "Proxied requests by tenant and method"
    );
    describe_histogram!(
        "okapi_module_request_duration_seconds",
        Unit::Seconds,
        "Upstream exchange duration by tenant and module"
    );

    tracing::info!(address = %address, "Prometheus metrics exporter listening");
    Ok(())
}
