//! # Database Connection Pool
//!
//! Connection pool creation from the `postgres_*` options.

use crate::config::DatabaseConfig;
use crate::errors::{OkapiError, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

/// Type alias for the database connection pool
pub type DbPool = PgPool;

/// Create a connection pool and bring the schema up to date. With
/// `postgres_db_init=1` the whole schema is dropped and recreated first.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let connect_options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.database);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout())
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                url = %config.sanitized_url(),
                "Failed to create PostgreSQL connection pool"
            );
            OkapiError::Database {
                source: e,
                context: format!("Failed to connect to database: {}", config.sanitized_url()),
            }
        })?;

    tracing::info!(
        url = %config.sanitized_url(),
        max_connections = config.max_connections,
        "Database connection pool created"
    );

    if config.db_init {
        tracing::warn!("postgres_db_init=1: re-initializing the whole database");
        crate::storage::migrations::init_database(&pool).await?;
    } else {
        crate::storage::migrations::run_migrations(&pool).await?;
    }

    Ok(pool)
}
