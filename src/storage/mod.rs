//! # Persistence Layer
//!
//! PostgreSQL-backed storage for module descriptors, tenants and the
//! cluster reload timestamp. The running gateway reads from its in-memory
//! snapshots; the store is the shared source of truth nodes reload from.

pub mod migrations;
mod pool;
pub mod repositories;

pub use pool::{create_pool, DbPool};
pub use repositories::{
    ModuleRepository, SqlConfStore, TenantRepository, TimestampRepository, MODULES_TIMESTAMP_KEY,
};
