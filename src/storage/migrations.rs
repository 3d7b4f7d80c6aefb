//! # Schema Migrations
//!
//! Idempotent schema setup. Descriptors are stored as JSON documents in
//! TEXT columns; the timestamp table holds one row per key.

use crate::errors::{OkapiError, Result};
use sqlx::PgPool;

const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS modules (
        id TEXT PRIMARY KEY,
        descriptor TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS tenants (
        id TEXT PRIMARY KEY,
        descriptor TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS timestamps (
        id TEXT PRIMARY KEY,
        value BIGINT NOT NULL
    )",
];

const DROP_TABLES: &[&str] = &[
    "DROP TABLE IF EXISTS modules",
    "DROP TABLE IF EXISTS tenants",
    "DROP TABLE IF EXISTS timestamps",
];

/// Bring the schema up to date
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    for statement in CREATE_TABLES {
        sqlx::query(statement).execute(pool).await.map_err(|e| OkapiError::Database {
            source: e,
            context: "Failed to run schema migration".to_string(),
        })?;
    }
    tracing::info!("Database schema is up to date");
    Ok(())
}

/// Drop everything and recreate the schema from scratch
pub async fn init_database(pool: &PgPool) -> Result<()> {
    for statement in DROP_TABLES {
        sqlx::query(statement).execute(pool).await.map_err(|e| OkapiError::Database {
            source: e,
            context: "Failed to drop schema".to_string(),
        })?;
    }
    run_migrations(pool).await
}
