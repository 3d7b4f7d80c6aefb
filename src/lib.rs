//! # Okapi
//!
//! Okapi is a multi-tenant API gateway for a modular service platform.
//! Incoming requests are associated with a tenant, matched against the
//! modules enabled for that tenant, and routed through an ordered pipeline
//! of module invocations whose composed output is returned to the client.
//!
//! ## Architecture
//!
//! ```text
//! Client → HTTP frontend → PipelineBuilder → AuthHeaderPlanner
//!            ↓                  ↓                  ↓
//!        ProxyEngine ← DiscoveryManager ← ModuleCatalog + TenantRegistry
//! ```
//!
//! ## Core Components
//!
//! - **Proxy engine**: streaming state machine walking the pipeline, one
//!   upstream request per hop, chained under four proxy disciplines
//! - **Catalog / tenants / discovery**: copy-on-write snapshots of module
//!   descriptors, tenant enablement and deployment records
//! - **Cluster sync**: monotonic-timestamp reload signals on a shared bus
//! - **Persistence layer**: sqlx repositories over PostgreSQL

pub mod api;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod proxy;
pub mod services;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{OkapiError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
