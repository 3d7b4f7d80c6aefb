//! # Tenants
//!
//! A tenant is a namespace owning a subset of enabled modules. The pipeline
//! builder only considers modules the request's tenant has enabled.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A tenant and its enabled module ids
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tenant {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Module ids enabled for this tenant. Referential integrity against
    /// the catalog is enforced at enable time, not re-checked per request.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub enabled: BTreeSet<String>,
}

impl Tenant {
    /// Create a tenant with no modules enabled
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    /// Whether the given module is enabled for this tenant
    pub fn is_enabled(&self, module_id: &str) -> bool {
        self.enabled.contains(module_id)
    }

    /// Enable a module; returns false if it was already enabled
    pub fn enable(&mut self, module_id: &str) -> bool {
        self.enabled.insert(module_id.to_string())
    }

    /// Disable a module; returns false if it was not enabled
    pub fn disable(&mut self, module_id: &str) -> bool {
        self.enabled.remove(module_id)
    }
}
