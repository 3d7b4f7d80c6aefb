//! # Timestamp Repository
//!
//! The single monotonic timestamp behind the cluster reload protocol.
//! `advance` runs a `SELECT … FOR UPDATE; UPDATE` cycle so that concurrent
//! writers on different nodes serialize through the row lock and every
//! caller gets a value strictly greater than anything stored before.

use crate::errors::{OkapiError, Result};
use crate::storage::DbPool;
use tracing::instrument;

/// Fixed key for the modules configuration timestamp
pub const MODULES_TIMESTAMP_KEY: &str = "modules";

/// Repository for the persisted reload timestamps
#[derive(Debug, Clone)]
pub struct TimestampRepository {
    pool: DbPool,
}

impl TimestampRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Produce the next timestamp for `key`: strictly greater than the
    /// stored value and than `current`, and no older than wall-clock
    /// milliseconds so values stay meaningful across nodes.
    #[instrument(skip(self), name = "db_advance_timestamp")]
    pub async fn advance(&self, key: &str, current: i64) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(|e| OkapiError::Database {
            source: e,
            context: "Failed to begin timestamp transaction".to_string(),
        })?;

        let stored: Option<i64> =
            sqlx::query_scalar("SELECT value FROM timestamps WHERE id = $1 FOR UPDATE")
                .bind(key)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| OkapiError::Database {
                    source: e,
                    context: format!("Failed to read timestamp '{}'", key),
                })?;

        let now = chrono::Utc::now().timestamp_millis();
        let next = now.max(stored.unwrap_or(-1) + 1).max(current + 1);

        let statement = match stored {
            Some(_) => "UPDATE timestamps SET value = $2 WHERE id = $1",
            None => "INSERT INTO timestamps (id, value) VALUES ($1, $2)",
        };
        sqlx::query(statement).bind(key).bind(next).execute(&mut *tx).await.map_err(|e| {
            OkapiError::Database {
                source: e,
                context: format!("Failed to store timestamp '{}'", key),
            }
        })?;

        tx.commit().await.map_err(|e| OkapiError::Database {
            source: e,
            context: "Failed to commit timestamp transaction".to_string(),
        })?;
        Ok(next)
    }

    /// Read the current value for `key`, if any
    #[instrument(skip(self), name = "db_get_timestamp")]
    pub async fn get(&self, key: &str) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT value FROM timestamps WHERE id = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| OkapiError::Database {
                source: e,
                context: format!("Failed to read timestamp '{}'", key),
            })
    }
}
