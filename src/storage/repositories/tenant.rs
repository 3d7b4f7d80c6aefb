//! # Tenant Repository
//!
//! CRUD for tenants and their enablement sets, persisted as JSON documents.

use crate::domain::Tenant;
use crate::errors::{OkapiError, Result};
use crate::storage::DbPool;
use tracing::instrument;

/// Repository for tenant storage
#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: DbPool,
}

impl TenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id), name = "db_insert_tenant")]
    pub async fn insert(&self, tenant: &Tenant) -> Result<()> {
        let descriptor = serde_json::to_string(tenant)?;
        sqlx::query("INSERT INTO tenants (id, descriptor) VALUES ($1, $2)")
            .bind(&tenant.id)
            .bind(&descriptor)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, tenant_id = %tenant.id, "Failed to insert tenant");
                OkapiError::Database {
                    source: e,
                    context: format!("Failed to insert tenant '{}'", tenant.id),
                }
            })?;
        Ok(())
    }

    /// Persist an updated tenant record (e.g. after enable/disable)
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id), name = "db_update_tenant")]
    pub async fn update(&self, tenant: &Tenant) -> Result<()> {
        let descriptor = serde_json::to_string(tenant)?;
        let result =
            sqlx::query("UPDATE tenants SET descriptor = $2, updated_at = now() WHERE id = $1")
                .bind(&tenant.id)
                .bind(&descriptor)
                .execute(&self.pool)
                .await
                .map_err(|e| OkapiError::Database {
                    source: e,
                    context: format!("Failed to update tenant '{}'", tenant.id),
                })?;
        if result.rows_affected() == 0 {
            return Err(OkapiError::not_found(format!("Tenant '{}' not found", tenant.id)));
        }
        Ok(())
    }

    #[instrument(skip(self), name = "db_get_tenant")]
    pub async fn get(&self, id: &str) -> Result<Tenant> {
        let descriptor: Option<String> =
            sqlx::query_scalar("SELECT descriptor FROM tenants WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| OkapiError::Database {
                    source: e,
                    context: format!("Failed to get tenant '{}'", id),
                })?;
        match descriptor {
            Some(descriptor) => Ok(serde_json::from_str(&descriptor)?),
            None => Err(OkapiError::not_found(format!("Tenant '{}' not found", id))),
        }
    }

    #[instrument(skip(self), name = "db_get_all_tenants")]
    pub async fn get_all(&self) -> Result<Vec<Tenant>> {
        let rows: Vec<String> = sqlx::query_scalar("SELECT descriptor FROM tenants ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| OkapiError::Database {
                source: e,
                context: "Failed to list tenants".to_string(),
            })?;
        rows.iter().map(|d| serde_json::from_str(d).map_err(Into::into)).collect()
    }

    #[instrument(skip(self), name = "db_delete_tenant")]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| OkapiError::Database {
                source: e,
                context: format!("Failed to delete tenant '{}'", id),
            })?;
        if result.rows_affected() == 0 {
            return Err(OkapiError::not_found(format!("Tenant '{}' not found", id)));
        }
        Ok(())
    }
}
