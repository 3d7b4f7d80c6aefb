//! # Module Catalog
//!
//! The set of known modules, indexed by id. Reads are lock-free snapshot
//! clones; writes copy the map. The `BTreeMap` keeps iteration in id order,
//! which is also the pipeline builder's tie-break order, so pipeline
//! construction is deterministic for a given snapshot.

use crate::domain::ModuleDescriptor;
use crate::errors::{OkapiError, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// An immutable view of the catalog at one point in time
pub type CatalogSnapshot = Arc<BTreeMap<String, Arc<ModuleDescriptor>>>;

/// The set of known modules, shared across all requests
#[derive(Debug, Default)]
pub struct ModuleCatalog {
    modules: RwLock<CatalogSnapshot>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; cheap to clone, stable to iterate
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.modules.read().expect("catalog lock").clone()
    }

    /// Look up a module by id
    pub fn get(&self, id: &str) -> Option<Arc<ModuleDescriptor>> {
        self.snapshot().get(id).cloned()
    }

    /// All known module ids, in iteration order
    pub fn list_ids(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    /// Insert a new module; fails if the id is already taken
    pub fn insert(&self, md: ModuleDescriptor) -> Result<()> {
        let mut guard = self.modules.write().expect("catalog lock");
        if guard.contains_key(&md.id) {
            return Err(OkapiError::user(format!("Module '{}' already exists", md.id)));
        }
        let mut next = BTreeMap::clone(&guard);
        next.insert(md.id.clone(), Arc::new(md));
        *guard = Arc::new(next);
        Ok(())
    }

    /// Replace an existing module
    pub fn update(&self, md: ModuleDescriptor) -> Result<()> {
        let mut guard = self.modules.write().expect("catalog lock");
        if !guard.contains_key(&md.id) {
            return Err(OkapiError::not_found(format!("Module '{}' not found", md.id)));
        }
        let mut next = BTreeMap::clone(&guard);
        next.insert(md.id.clone(), Arc::new(md));
        *guard = Arc::new(next);
        Ok(())
    }

    /// Remove a module by id
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut guard = self.modules.write().expect("catalog lock");
        if !guard.contains_key(id) {
            return Err(OkapiError::not_found(format!("Module '{}' not found", id)));
        }
        let mut next = BTreeMap::clone(&guard);
        next.remove(id);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Atomically replace the whole catalog, as done on a cluster reload
    pub fn replace_all(&self, modules: Vec<ModuleDescriptor>) {
        let next: BTreeMap<String, Arc<ModuleDescriptor>> =
            modules.into_iter().map(|md| (md.id.clone(), Arc::new(md))).collect();
        *self.modules.write().expect("catalog lock") = Arc::new(next);
    }
}
