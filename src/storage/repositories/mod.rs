//! # Repositories
//!
//! One repository per stored aggregate, plus the [`SqlConfStore`] facade
//! the cluster-sync protocol consumes.

mod module;
mod tenant;
mod timestamp;

pub use module::ModuleRepository;
pub use tenant::TenantRepository;
pub use timestamp::{TimestampRepository, MODULES_TIMESTAMP_KEY};

use crate::domain::{ModuleDescriptor, Tenant};
use crate::errors::Result;
use crate::services::ConfStore;
use crate::storage::DbPool;
use async_trait::async_trait;

/// The store operations cluster sync depends on, backed by the sqlx
/// repositories.
#[derive(Debug, Clone)]
pub struct SqlConfStore {
    modules: ModuleRepository,
    tenants: TenantRepository,
    timestamps: TimestampRepository,
}

impl SqlConfStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            modules: ModuleRepository::new(pool.clone()),
            tenants: TenantRepository::new(pool.clone()),
            timestamps: TimestampRepository::new(pool),
        }
    }

    pub fn modules(&self) -> &ModuleRepository {
        &self.modules
    }

    pub fn tenants(&self) -> &TenantRepository {
        &self.tenants
    }

    pub fn timestamps(&self) -> &TimestampRepository {
        &self.timestamps
    }
}

#[async_trait]
impl ConfStore for SqlConfStore {
    async fn advance_timestamp(&self, current: i64) -> Result<i64> {
        self.timestamps.advance(MODULES_TIMESTAMP_KEY, current).await
    }

    async fn load_modules(&self) -> Result<Vec<ModuleDescriptor>> {
        self.modules.get_all().await
    }

    async fn load_tenants(&self) -> Result<Vec<Tenant>> {
        self.tenants.get_all().await
    }
}
