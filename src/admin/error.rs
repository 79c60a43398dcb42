//! Admin API errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Registry(RegistryError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Registry(RegistryError::ReadOnly) => (StatusCode::CONFLICT, "read_only"),
            ApiError::Registry(RegistryError::Validation(_)) => (StatusCode::BAD_REQUEST, "validation_failed"),
            ApiError::Registry(RegistryError::Store(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Admin request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
