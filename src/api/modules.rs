//! # Module Admin Handlers
//!
//! CRUD for module descriptors. Writes go to the running system first
//! (that is where duplicates are detected), then to the store, and finally
//! send the reload signal so other nodes pick the change up.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode};
use axum::Json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{ModuleBrief, ModuleDescriptor};
use crate::errors::OkapiError;

use super::{ApiError, ApiResult, ApiState};

fn decode<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError(OkapiError::user(rejection.body_text()))),
    }
}

pub async fn list_modules(State(state): State<ApiState>) -> ApiResult<Json<Vec<ModuleBrief>>> {
    let modules = state.store.modules().get_all().await?;
    Ok(Json(modules.iter().map(ModuleBrief::from).collect()))
}

pub async fn get_module(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ModuleDescriptor>> {
    Ok(Json(state.store.modules().get(&id).await?))
}

pub async fn create_module(
    State(state): State<ApiState>,
    payload: Result<Json<ModuleDescriptor>, JsonRejection>,
) -> ApiResult<(StatusCode, HeaderMap, Json<ModuleDescriptor>)> {
    let mut md = decode(payload)?;
    if md.id.is_empty() {
        md.id = Uuid::new_v4().to_string();
    }
    md.validate()?;

    state.catalog.insert(md.clone())?;
    if let Err(store_err) = state.store.modules().insert(&md).await {
        // Keep runtime and store consistent: undo the in-memory insert and
        // report why the store rejected it
        warn!(module_id = %md.id, error = %store_err, "Store insert failed, rolling back");
        let _ = state.catalog.delete(&md.id);
        return Err(store_err.into());
    }
    state.sync.send_reload_signal().await?;
    info!(module_id = %md.id, "Created module");

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("/_/proxy/modules/{}", md.id)) {
        headers.insert(LOCATION, value);
    }
    Ok((StatusCode::CREATED, headers, Json(md)))
}

pub async fn update_module(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<ModuleDescriptor>, JsonRejection>,
) -> ApiResult<Json<ModuleDescriptor>> {
    let md = decode(payload)?;
    if md.id != id {
        return Err(ApiError(OkapiError::user(format!(
            "Module.id={} does not match path id={}",
            md.id, id
        ))));
    }
    md.validate()?;

    state.catalog.update(md.clone())?;
    state.store.modules().update(&md).await?;
    state.sync.send_reload_signal().await?;
    info!(module_id = %md.id, "Updated module");
    Ok(Json(md))
}

pub async fn delete_module(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.catalog.delete(&id)?;
    state.store.modules().delete(&id).await?;
    state.sync.send_reload_signal().await?;
    info!(module_id = %id, "Deleted module");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reload_modules(State(state): State<ApiState>) -> ApiResult<StatusCode> {
    state.sync.reload().await?;
    Ok(StatusCode::NO_CONTENT)
}
