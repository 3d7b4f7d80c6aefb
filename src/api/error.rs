//! # API Error Rendering
//!
//! Maps gateway errors onto HTTP responses: 4xx bodies are short plain
//! text, 5xx bodies carry the underlying message for operator debugging.

use crate::errors::OkapiError;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Wrapper giving `OkapiError` an HTTP rendering
#[derive(Debug)]
pub struct ApiError(pub OkapiError);

impl From<OkapiError> for ApiError {
    fn from(err: OkapiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let mut response = Response::new(self.0.to_string().into());
        *response.status_mut() = status;
        response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        response
    }
}
