//! Translation from [`DomainError`] (and ad-hoc request validation
//! failures) to a typed JSON error body plus HTTP status, so the API never
//! answers a named failure mode with a bare 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dispatch_core::DomainError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Validation(String),
    Unauthorized,
    Conflict(String),
    Internal(DomainError),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::TaskNotFound(_)
            | DomainError::AgentNotFound(_)
            | DomainError::RunnerNotFound(_)
            | DomainError::ScreenshotNotFound(_) => ApiError::NotFound(err.to_string()),
            DomainError::ValidationFailed(msg) => ApiError::Validation(msg),
            DomainError::InvalidStateTransition { .. } => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "invalid or missing pymada_token_auth header".to_string())
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
