//! # Discovery Manager
//!
//! Maps a module id to the deployment records of its running instances.
//! The pipeline resolves each hop to the first record's URL; an empty list
//! fails the request before any upstream call is made.

use crate::domain::DeploymentDescriptor;
use crate::errors::{OkapiError, Result};
use dashmap::DashMap;
use uuid::Uuid;

/// Deployment records for running module instances
#[derive(Debug, Default)]
pub struct DiscoveryManager {
    deployments: DashMap<String, Vec<DeploymentDescriptor>>,
}

impl DiscoveryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deployment. Assigns an instance id when absent. The
    /// record must carry a URL: the gateway does not launch processes, it
    /// only routes to instances that already serve somewhere.
    pub fn add(&self, mut dd: DeploymentDescriptor) -> Result<DeploymentDescriptor> {
        if dd.srvc_id.is_empty() {
            return Err(OkapiError::user("Missing srvcId in deployment"));
        }
        if dd.url.as_deref().map(str::is_empty).unwrap_or(true) {
            return Err(OkapiError::user("Missing url in deployment"));
        }
        if dd.inst_id.is_none() {
            dd.inst_id = Some(Uuid::new_v4().to_string());
        }
        self.deployments.entry(dd.srvc_id.clone()).or_default().push(dd.clone());
        Ok(dd)
    }

    /// Remove an instance; the module's entry disappears with its last one
    pub fn remove(&self, srvc_id: &str, inst_id: &str) -> Result<()> {
        let mut removed = false;
        if let Some(mut entry) = self.deployments.get_mut(srvc_id) {
            let before = entry.len();
            entry.retain(|dd| dd.inst_id.as_deref() != Some(inst_id));
            removed = entry.len() < before;
        }
        if !removed {
            return Err(OkapiError::not_found(format!(
                "Deployment '{}/{}' not found",
                srvc_id, inst_id
            )));
        }
        self.deployments.remove_if(srvc_id, |_, v| v.is_empty());
        Ok(())
    }

    /// All records for a module, first record first
    pub fn get(&self, srvc_id: &str) -> Vec<DeploymentDescriptor> {
        self.deployments.get(srvc_id).map(|v| v.clone()).unwrap_or_default()
    }

    /// One specific instance
    pub fn get_instance(&self, srvc_id: &str, inst_id: &str) -> Result<DeploymentDescriptor> {
        self.get(srvc_id)
            .into_iter()
            .find(|dd| dd.inst_id.as_deref() == Some(inst_id))
            .ok_or_else(|| {
                OkapiError::not_found(format!("Deployment '{}/{}' not found", srvc_id, inst_id))
            })
    }

    /// All records across all modules, ordered by module id
    pub fn list(&self) -> Vec<DeploymentDescriptor> {
        let mut all: Vec<DeploymentDescriptor> =
            self.deployments.iter().flat_map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.srvc_id.cmp(&b.srvc_id));
        all
    }

    /// The URL the pipeline should use for a module: first record wins
    pub fn resolve(&self, module_id: &str) -> Option<String> {
        self.deployments.get(module_id).and_then(|v| v.first().and_then(|dd| dd.url.clone()))
    }
}
