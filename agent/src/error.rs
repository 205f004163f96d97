//! Typed JSON error bodies for the agent's local HTTP surface, mirroring
//! the original Flask routes' `{'error': ...}` bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum AgentHttpError {
    NoRunner,
    NoCurrentTask,
    BadRequest(String),
    Unauthorized,
}

impl IntoResponse for AgentHttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AgentHttpError::NoRunner => (StatusCode::INTERNAL_SERVER_ERROR, "no runner available".to_string()),
            AgentHttpError::NoCurrentTask => (StatusCode::BAD_REQUEST, "no current task".to_string()),
            AgentHttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AgentHttpError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "invalid or missing pymada_token_auth header".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
