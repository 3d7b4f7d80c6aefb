//! # Module Descriptors
//!
//! A module descriptor declares what an upstream service provides: routing
//! entries (directly, via filters, or via provided interfaces), required
//! and provided interfaces, permission sets, and launch information. The
//! catalog stores these; the pipeline builder consumes their proxy routing
//! entries.

use crate::domain::routing::RoutingEntry;
use crate::errors::{OkapiError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-z0-9._-]+$").expect("static pattern"));

/// An environment entry passed to a launched module instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvEntry {
    pub name: String,
    pub value: String,
}

/// A named permission a module defines or expands
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permission {
    pub permission_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_permissions: Vec<String>,
}

/// How to start a module instance. The gateway carries this as inert data;
/// process and container launching happen elsewhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmdline_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmdline_stop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_pull: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvEntry>,
}

/// An interface a module provides or requires
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfaceDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `"proxy"` (default) entries join pipelines; `"system"` interfaces
    /// are called by the gateway itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<String>,
    #[serde(alias = "routingEntries", skip_serializing_if = "Vec::is_empty")]
    pub handlers: Vec<RoutingEntry>,
}

impl InterfaceDescriptor {
    /// Effective interface type, `"proxy"` when unset
    pub fn interface_type(&self) -> &str {
        match self.interface_type.as_deref() {
            None | Some("") => "proxy",
            Some(t) => t,
        }
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.id.is_empty() {
            return Err(OkapiError::user(format!("Missing id in '{}' interface", section)));
        }
        for entry in &self.handlers {
            entry.validate(&format!("interface {}", self.id))?;
        }
        Ok(())
    }
}

/// Description of a module, as created under `/_/proxy/modules`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<InterfaceDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<InterfaceDescriptor>,
    /// Deprecated top-level entries; use interface handlers instead
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routing_entries: Vec<RoutingEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<RoutingEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permission_sets: Vec<Permission>,
    /// Deprecated module-wide permissions; use the ones on routing entries
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub module_permissions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_descriptor: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_descriptor: Option<LaunchDescriptor>,
}

impl ModuleDescriptor {
    /// Human-facing name, falling back to the id. Used in trace headers
    /// and error texts.
    pub fn name_or_id(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }

    /// All routing entries that participate in proxying: top-level entries,
    /// filters, and the handlers of every provided `proxy` interface.
    pub fn proxy_routing_entries(&self) -> Vec<&RoutingEntry> {
        let mut all: Vec<&RoutingEntry> = Vec::new();
        all.extend(self.routing_entries.iter());
        all.extend(self.filters.iter());
        for interface in &self.provides {
            if interface.interface_type() == "proxy" {
                all.extend(interface.handlers.iter());
            }
        }
        all
    }

    /// Look up a provided system interface by id
    pub fn system_interface(&self, interface_id: &str) -> Option<&InterfaceDescriptor> {
        self.provides
            .iter()
            .find(|i| i.interface_type() == "system" && i.id == interface_id)
    }

    /// Validate the descriptor. Deprecated constructs are accepted with a
    /// warning.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(OkapiError::user("No id in module"));
        }
        if !ID_PATTERN.is_match(&self.id) {
            return Err(OkapiError::user(format!("Invalid module id '{}'", self.id)));
        }
        for interface in &self.provides {
            interface.validate("provides")?;
        }
        for interface in &self.requires {
            interface.validate("requires")?;
        }
        if !self.routing_entries.is_empty() {
            tracing::warn!(
                module = %self.name_or_id(),
                "Module uses deprecated top-level routingEntries; use interface handlers instead"
            );
            for entry in &self.routing_entries {
                entry.validate("toplevel")?;
            }
        }
        for entry in &self.filters {
            entry.validate("filters")?;
        }
        if !self.env.is_empty() {
            tracing::warn!(
                module = %self.name_or_id(),
                "Module uses deprecated top-level environment settings; put those in the launchDescriptor"
            );
        }
        if !self.module_permissions.is_empty() {
            tracing::warn!(
                module = %self.name_or_id(),
                "Module uses deprecated module-wide modulePermissions; put those on routing entries"
            );
        }
        Ok(())
    }
}

/// Projection of a module descriptor for list responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleBrief {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&ModuleDescriptor> for ModuleBrief {
    fn from(md: &ModuleDescriptor) -> Self {
        Self { id: md.id.clone(), name: md.name.clone() }
    }
}
