//! # Pipeline Construction
//!
//! Builds the ordered list of module invocations for one request: match
//! every enabled module's proxy routing entries against the request, expand
//! redirect entries into their targets, order by phase level, and reject
//! pipelines that consist purely of filters.
//!
//! Construction is a pure function of (catalog snapshot, tenant, request);
//! it never opens sockets, and for a given snapshot it is deterministic.

use crate::domain::{ModuleDescriptor, ProxyType, RoutingEntry, Tenant};
use crate::errors::{OkapiError, Result};
use crate::services::CatalogSnapshot;
use std::sync::Arc;

/// One hop of a pipeline: the module to call, the routing entry that
/// matched, and the request-scoped state the engine mutates (rewritten URI,
/// resolved URL, per-hop auth token).
#[derive(Debug, Clone)]
pub struct ModuleInstance {
    pub module: Arc<ModuleDescriptor>,
    pub entry: RoutingEntry,
    pub uri: String,
    pub url: Option<String>,
    pub auth_token: Option<String>,
}

impl ModuleInstance {
    fn new(module: Arc<ModuleDescriptor>, entry: &RoutingEntry, uri: String) -> Self {
        Self { module, entry: entry.clone(), uri, url: None, auth_token: None }
    }
}

/// Build the pipeline for a (tenant, request) pair
pub fn build_pipeline(
    snapshot: &CatalogSnapshot,
    tenant: &Tenant,
    method: &str,
    uri: &str,
) -> Result<Vec<ModuleInstance>> {
    let mut hops: Vec<ModuleInstance> = Vec::new();
    for (id, module) in snapshot.iter() {
        if !tenant.is_enabled(id) {
            continue;
        }
        for entry in module.proxy_routing_entries() {
            if entry.matches(uri, Some(method)) {
                expand_redirects(snapshot, tenant, module.clone(), entry, method, uri, "", &mut hops)?;
            }
        }
    }

    // Stable sort: equal phase levels keep catalog iteration order
    hops.sort_by(|a, b| a.entry.phase_level().cmp(b.entry.phase_level()));

    // A pipeline of nothing but filters (every selector no longer than '/')
    // means no real handler claimed the request
    let has_handler = hops.iter().any(|hop| !hop.entry.matches("/", None));
    if !has_handler {
        return Err(OkapiError::not_found(format!("No suitable module found for {}", uri)));
    }
    Ok(hops)
}

/// Append a hop and, for redirect entries, the hops of every matching
/// target. `trail` records the redirect paths walked so far; revisiting one
/// is a cycle.
#[allow(clippy::too_many_arguments)]
fn expand_redirects(
    snapshot: &CatalogSnapshot,
    tenant: &Tenant,
    module: Arc<ModuleDescriptor>,
    entry: &RoutingEntry,
    method: &str,
    uri: &str,
    trail: &str,
    hops: &mut Vec<ModuleInstance>,
) -> Result<()> {
    hops.push(ModuleInstance::new(module, entry, uri.to_string()));
    if entry.proxy_type != ProxyType::Redirect {
        return Ok(());
    }

    let redirect_path = entry.redirect_path.as_deref().unwrap_or("");
    let mut found = false;
    for (target_id, target) in snapshot.iter() {
        if !tenant.is_enabled(target_id) {
            continue;
        }
        for target_entry in target.proxy_routing_entries() {
            if !target_entry.matches(redirect_path, Some(method)) {
                continue;
            }
            if trail.split(" -> ").any(|seen| seen == redirect_path) {
                return Err(OkapiError::internal(format!(
                    "Redirect loop: {} -> {}",
                    trail, redirect_path
                )));
            }
            found = true;
            let new_uri = entry.redirect_uri(uri);
            tracing::debug!(
                method,
                uri,
                target = %target_id,
                new_uri = %new_uri,
                "Resolved redirect"
            );
            expand_redirects(
                snapshot,
                tenant,
                target.clone(),
                target_entry,
                method,
                &new_uri,
                &format!("{} -> {}", trail, redirect_path),
                hops,
            )?;
        }
    }
    if !found {
        return Err(OkapiError::internal(format!(
            "Redirecting {} to {} FAILED. No suitable module found",
            uri, redirect_path
        )));
    }
    Ok(())
}
