//! # Deployment Admin Handlers
//!
//! Registration of running module instances in the discovery map. These
//! records are runtime state shared via discovery, not part of the
//! persisted configuration, so no reload signal is involved.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode};
use axum::Json;
use tracing::info;

use crate::domain::DeploymentDescriptor;
use crate::errors::OkapiError;

use super::{ApiError, ApiResult, ApiState};

pub async fn list_deployments(
    State(state): State<ApiState>,
) -> ApiResult<Json<Vec<DeploymentDescriptor>>> {
    Ok(Json(state.discovery.list()))
}

pub async fn get_deployments(
    State(state): State<ApiState>,
    Path(srvc_id): Path<String>,
) -> ApiResult<Json<Vec<DeploymentDescriptor>>> {
    let records = state.discovery.get(&srvc_id);
    if records.is_empty() {
        return Err(ApiError(OkapiError::not_found(format!(
            "No deployments for module '{}'",
            srvc_id
        ))));
    }
    Ok(Json(records))
}

pub async fn get_deployment(
    State(state): State<ApiState>,
    Path((srvc_id, inst_id)): Path<(String, String)>,
) -> ApiResult<Json<DeploymentDescriptor>> {
    Ok(Json(state.discovery.get_instance(&srvc_id, &inst_id)?))
}

pub async fn create_deployment(
    State(state): State<ApiState>,
    payload: Result<Json<DeploymentDescriptor>, JsonRejection>,
) -> ApiResult<(StatusCode, HeaderMap, Json<DeploymentDescriptor>)> {
    let dd = match payload {
        Ok(Json(dd)) => dd,
        Err(rejection) => return Err(ApiError(OkapiError::user(rejection.body_text()))),
    };
    let created = state.discovery.add(dd)?;
    info!(
        srvc_id = %created.srvc_id,
        inst_id = created.inst_id.as_deref().unwrap_or(""),
        url = created.url.as_deref().unwrap_or(""),
        "Registered deployment"
    );

    let mut headers = HeaderMap::new();
    let location = format!(
        "/_/discovery/modules/{}/{}",
        created.srvc_id,
        created.inst_id.as_deref().unwrap_or("")
    );
    if let Ok(value) = HeaderValue::from_str(&location) {
        headers.insert(LOCATION, value);
    }
    Ok((StatusCode::CREATED, headers, Json(created)))
}

pub async fn delete_deployment(
    State(state): State<ApiState>,
    Path((srvc_id, inst_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.discovery.remove(&srvc_id, &inst_id)?;
    info!(srvc_id = %srvc_id, inst_id = %inst_id, "Removed deployment");
    Ok(StatusCode::NO_CONTENT)
}
