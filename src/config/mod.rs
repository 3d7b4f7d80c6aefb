//! # Configuration Management
//!
//! Configuration structures for the Okapi gateway, loaded from environment
//! variables with development-only defaults.

mod settings;

pub use settings::{
    AppConfig, DatabaseConfig, GatewayConfig, ObservabilityConfig, ServerConfig,
};
