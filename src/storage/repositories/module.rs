//! # Module Repository
//!
//! CRUD for module descriptors, persisted as JSON documents.

use crate::domain::ModuleDescriptor;
use crate::errors::{OkapiError, Result};
use crate::storage::DbPool;
use tracing::instrument;

/// Repository for module descriptor storage
#[derive(Debug, Clone)]
pub struct ModuleRepository {
    pool: DbPool,
}

impl ModuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, md), fields(module_id = %md.id), name = "db_insert_module")]
    pub async fn insert(&self, md: &ModuleDescriptor) -> Result<()> {
        let descriptor = serde_json::to_string(md)?;
        sqlx::query("INSERT INTO modules (id, descriptor) VALUES ($1, $2)")
            .bind(&md.id)
            .bind(&descriptor)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, module_id = %md.id, "Failed to insert module");
                OkapiError::Database {
                    source: e,
                    context: format!("Failed to insert module '{}'", md.id),
                }
            })?;
        Ok(())
    }

    #[instrument(skip(self, md), fields(module_id = %md.id), name = "db_update_module")]
    pub async fn update(&self, md: &ModuleDescriptor) -> Result<()> {
        let descriptor = serde_json::to_string(md)?;
        let result =
            sqlx::query("UPDATE modules SET descriptor = $2, updated_at = now() WHERE id = $1")
                .bind(&md.id)
                .bind(&descriptor)
                .execute(&self.pool)
                .await
                .map_err(|e| OkapiError::Database {
                    source: e,
                    context: format!("Failed to update module '{}'", md.id),
                })?;
        if result.rows_affected() == 0 {
            return Err(OkapiError::not_found(format!("Module '{}' not found", md.id)));
        }
        Ok(())
    }

    #[instrument(skip(self), name = "db_get_module")]
    pub async fn get(&self, id: &str) -> Result<ModuleDescriptor> {
        let descriptor: Option<String> =
            sqlx::query_scalar("SELECT descriptor FROM modules WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| OkapiError::Database {
                    source: e,
                    context: format!("Failed to get module '{}'", id),
                })?;
        match descriptor {
            Some(descriptor) => Ok(serde_json::from_str(&descriptor)?),
            None => Err(OkapiError::not_found(format!("Module '{}' not found", id))),
        }
    }

    #[instrument(skip(self), name = "db_get_all_modules")]
    pub async fn get_all(&self) -> Result<Vec<ModuleDescriptor>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT descriptor FROM modules ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| OkapiError::Database {
                    source: e,
                    context: "Failed to list modules".to_string(),
                })?;
        rows.iter().map(|d| serde_json::from_str(d).map_err(Into::into)).collect()
    }

    #[instrument(skip(self), name = "db_delete_module")]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| OkapiError::Database {
                source: e,
                context: format!("Failed to delete module '{}'", id),
            })?;
        if result.rows_affected() == 0 {
            return Err(OkapiError::not_found(format!("Module '{}' not found", id)));
        }
        Ok(())
    }
}
