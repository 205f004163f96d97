//! `/add_url`, `/log_error`: thin relays onto the master, used by the
//! runner client library so a runner script never holds a master URL.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AgentHttpError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddUrlRequest {
    pub url: String,
    pub json_metadata: Option<String>,
}

pub async fn add_url(State(state): State<AppState>, Json(req): Json<AddUrlRequest>) -> Result<Json<Value>, AgentHttpError> {
    let core = state.core.lock().await;
    core.add_url(req.url, req.json_metadata)
        .await
        .map(Json)
        .map_err(|e| AgentHttpError::BadRequest(e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct LogErrorRequest {
    pub message: Option<String>,
}

pub async fn log_error(State(state): State<AppState>, Json(req): Json<LogErrorRequest>) -> Result<Json<Value>, AgentHttpError> {
    let Some(message) = req.message else {
        return Err(AgentHttpError::BadRequest(r#"request needs to have a "message" attribute"#.to_string()));
    };

    let core = state.core.lock().await;
    core.log_error(message).await.map(Json).map_err(|e| AgentHttpError::BadRequest(e.to_string()))
}
