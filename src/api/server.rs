//! # HTTP Server

use crate::config::ServerConfig;
use crate::errors::{OkapiError, Result};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Bind the gateway listener and serve until ctrl-c
pub async fn start_server(config: &ServerConfig, router: Router) -> Result<()> {
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| OkapiError::config(format!("Invalid listen address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| OkapiError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    info!(address = %addr, "Okapi gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Shutdown listener failed");
            }
        })
        .await
        .map_err(|e| OkapiError::internal(format!("Server error: {}", e)))?;

    info!("Gateway shutdown completed");
    Ok(())
}
