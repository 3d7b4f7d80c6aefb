//! # Health Probe

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

pub async fn health_check() -> impl IntoResponse {
    let health = serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
    });
    (StatusCode::OK, Json(health))
}
