//! # Router
//!
//! Admin routes under `/_/`, a health probe, and the gateway fallback that
//! proxies everything else.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;

use crate::proxy::ProxyService;
use crate::services::{ClusterSync, DiscoveryManager, ModuleCatalog, TenantRegistry};
use crate::storage::SqlConfStore;

use super::{deployments, health, modules, tenants};

/// Shared state for the admin handlers and the gateway route
#[derive(Clone)]
pub struct ApiState {
    pub catalog: Arc<ModuleCatalog>,
    pub tenants: Arc<TenantRegistry>,
    pub discovery: Arc<DiscoveryManager>,
    pub sync: Arc<ClusterSync>,
    pub store: Arc<SqlConfStore>,
    pub proxy: Arc<ProxyService>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/_/proxy/modules",
            get(modules::list_modules).post(modules::create_module),
        )
        .route("/_/proxy/modules/_reload", post(modules::reload_modules))
        .route(
            "/_/proxy/modules/:id",
            get(modules::get_module)
                .put(modules::update_module)
                .delete(modules::delete_module),
        )
        .route(
            "/_/proxy/tenants",
            get(tenants::list_tenants).post(tenants::create_tenant),
        )
        .route(
            "/_/proxy/tenants/:id",
            get(tenants::get_tenant).delete(tenants::delete_tenant),
        )
        .route("/_/proxy/tenants/:id/modules", post(tenants::enable_module))
        .route(
            "/_/proxy/tenants/:id/modules/:module_id",
            axum::routing::delete(tenants::disable_module),
        )
        .route(
            "/_/discovery/modules",
            get(deployments::list_deployments).post(deployments::create_deployment),
        )
        .route("/_/discovery/modules/:srvc_id", get(deployments::get_deployments))
        .route(
            "/_/discovery/modules/:srvc_id/:inst_id",
            get(deployments::get_deployment).delete(deployments::delete_deployment),
        )
        .route("/health", get(health::health_check))
        .fallback(proxy_handler)
        .with_state(state)
}

/// Everything that is not an admin route goes through the pipeline
async fn proxy_handler(State(state): State<ApiState>, request: Request) -> Response {
    state.proxy.handle(request).await
}
