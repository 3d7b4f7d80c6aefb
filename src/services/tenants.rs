//! # Tenant Registry
//!
//! Per-tenant enablement state, with the same copy-on-write snapshot
//! discipline as the catalog.

use crate::domain::Tenant;
use crate::errors::{OkapiError, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

type TenantSnapshot = Arc<BTreeMap<String, Arc<Tenant>>>;

/// The set of known tenants, shared across all requests
#[derive(Debug, Default)]
pub struct TenantRegistry {
    tenants: RwLock<TenantSnapshot>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a tenant by id
    pub fn get(&self, id: &str) -> Option<Arc<Tenant>> {
        self.tenants.read().expect("tenant lock").get(id).cloned()
    }

    /// All known tenants, in id order
    pub fn list(&self) -> Vec<Arc<Tenant>> {
        self.tenants.read().expect("tenant lock").values().cloned().collect()
    }

    /// Whether `module_id` is enabled for `tenant_id`
    pub fn is_enabled(&self, tenant_id: &str, module_id: &str) -> bool {
        self.get(tenant_id).map(|t| t.is_enabled(module_id)).unwrap_or(false)
    }

    /// Insert a new tenant; fails if the id is already taken
    pub fn insert(&self, tenant: Tenant) -> Result<()> {
        let mut guard = self.tenants.write().expect("tenant lock");
        if guard.contains_key(&tenant.id) {
            return Err(OkapiError::user(format!("Tenant '{}' already exists", tenant.id)));
        }
        let mut next = BTreeMap::clone(&guard);
        next.insert(tenant.id.clone(), Arc::new(tenant));
        *guard = Arc::new(next);
        Ok(())
    }

    /// Remove a tenant by id
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut guard = self.tenants.write().expect("tenant lock");
        if !guard.contains_key(id) {
            return Err(OkapiError::not_found(format!("Tenant '{}' not found", id)));
        }
        let mut next = BTreeMap::clone(&guard);
        next.remove(id);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Enable a module for a tenant, returning the updated record. The
    /// caller is responsible for checking the module exists in the catalog.
    pub fn enable_module(&self, tenant_id: &str, module_id: &str) -> Result<Tenant> {
        self.mutate(tenant_id, |t| {
            t.enable(module_id);
            Ok(())
        })
    }

    /// Disable a module for a tenant, returning the updated record
    pub fn disable_module(&self, tenant_id: &str, module_id: &str) -> Result<Tenant> {
        self.mutate(tenant_id, |t| {
            if !t.disable(module_id) {
                return Err(OkapiError::not_found(format!(
                    "Module '{}' not enabled for tenant '{}'",
                    module_id, t.id
                )));
            }
            Ok(())
        })
    }

    fn mutate(
        &self,
        tenant_id: &str,
        f: impl FnOnce(&mut Tenant) -> Result<()>,
    ) -> Result<Tenant> {
        let mut guard = self.tenants.write().expect("tenant lock");
        let Some(existing) = guard.get(tenant_id) else {
            return Err(OkapiError::not_found(format!("Tenant '{}' not found", tenant_id)));
        };
        let mut tenant = Tenant::clone(existing);
        f(&mut tenant)?;
        let mut next = BTreeMap::clone(&guard);
        next.insert(tenant.id.clone(), Arc::new(tenant.clone()));
        *guard = Arc::new(next);
        Ok(tenant)
    }

    /// Atomically replace all tenants, as done on a cluster reload
    pub fn replace_all(&self, tenants: Vec<Tenant>) {
        let next: BTreeMap<String, Arc<Tenant>> =
            tenants.into_iter().map(|t| (t.id.clone(), Arc::new(t))).collect();
        *self.tenants.write().expect("tenant lock") = Arc::new(next);
    }
}
