//! # Tenant Admin Handlers
//!
//! Tenant CRUD and the enable/disable surface for the tenant↔module map.
//! Enablement checks referential integrity against the catalog; per-request
//! routing trusts the enablement set after that.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::Tenant;
use crate::errors::OkapiError;

use super::{ApiError, ApiResult, ApiState};

/// Body of an enable request: the module to switch on
#[derive(Debug, Serialize, Deserialize)]
pub struct TenantModule {
    pub id: String,
}

fn decode<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError(OkapiError::user(rejection.body_text()))),
    }
}

pub async fn list_tenants(State(state): State<ApiState>) -> ApiResult<Json<Vec<Tenant>>> {
    Ok(Json(state.store.tenants().get_all().await?))
}

pub async fn get_tenant(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Tenant>> {
    Ok(Json(state.store.tenants().get(&id).await?))
}

pub async fn create_tenant(
    State(state): State<ApiState>,
    payload: Result<Json<Tenant>, JsonRejection>,
) -> ApiResult<(StatusCode, HeaderMap, Json<Tenant>)> {
    let mut tenant = decode(payload)?;
    if tenant.id.is_empty() {
        tenant.id = Uuid::new_v4().to_string();
    }

    state.tenants.insert(tenant.clone())?;
    if let Err(store_err) = state.store.tenants().insert(&tenant).await {
        warn!(tenant_id = %tenant.id, error = %store_err, "Store insert failed, rolling back");
        let _ = state.tenants.delete(&tenant.id);
        return Err(store_err.into());
    }
    state.sync.send_reload_signal().await?;
    info!(tenant_id = %tenant.id, "Created tenant");

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("/_/proxy/tenants/{}", tenant.id)) {
        headers.insert(LOCATION, value);
    }
    Ok((StatusCode::CREATED, headers, Json(tenant)))
}

pub async fn delete_tenant(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.tenants.delete(&id)?;
    state.store.tenants().delete(&id).await?;
    state.sync.send_reload_signal().await?;
    info!(tenant_id = %id, "Deleted tenant");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn enable_module(
    State(state): State<ApiState>,
    Path(tenant_id): Path<String>,
    payload: Result<Json<TenantModule>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TenantModule>)> {
    let body = decode(payload)?;
    // Every enabled id must refer to an existing module
    if state.catalog.get(&body.id).is_none() {
        return Err(ApiError(OkapiError::not_found(format!("Module '{}' not found", body.id))));
    }

    let updated = state.tenants.enable_module(&tenant_id, &body.id)?;
    state.store.tenants().update(&updated).await?;
    state.sync.send_reload_signal().await?;
    info!(tenant_id = %tenant_id, module_id = %body.id, "Enabled module for tenant");
    Ok((StatusCode::OK, Json(body)))
}

pub async fn disable_module(
    State(state): State<ApiState>,
    Path((tenant_id, module_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let updated = state.tenants.disable_module(&tenant_id, &module_id)?;
    state.store.tenants().update(&updated).await?;
    state.sync.send_reload_signal().await?;
    info!(tenant_id = %tenant_id, module_id = %module_id, "Disabled module for tenant");
    Ok(StatusCode::NO_CONTENT)
}
