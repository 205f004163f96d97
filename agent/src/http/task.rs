//! `/get_task`, `/save_results`: the runner client library's view onto the
//! agent's bound task.

use axum::extract::{Multipart, State};
use axum::Json;
use serde_json::Value;

use crate::error::AgentHttpError;
use crate::state::AppState;

pub async fn get_task(State(state): State<AppState>) -> Json<Value> {
    let core = state.core.lock().await;
    Json(serde_json::to_value(core.current_task()).unwrap_or(Value::Null))
}

pub async fn save_results(State(state): State<AppState>, Json(result): Json<Value>) -> Result<Json<Value>, AgentHttpError> {
    let mut core = state.core.lock().await;
    core.save_task_results(result).await.map_err(|_| AgentHttpError::NoCurrentTask)?;
    Ok(Json(serde_json::json!({})))
}

pub async fn save_screenshot(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<Value>, AgentHttpError> {
    let mut file_name = None;
    let mut bytes = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| AgentHttpError::BadRequest(e.to_string()))? {
        if field.name() == Some("screenshot") {
            file_name = field.file_name().map(str::to_string);
            bytes = Some(field.bytes().await.map_err(|e| AgentHttpError::BadRequest(e.to_string()))?.to_vec());
        }
    }

    let file_name = file_name.ok_or_else(|| AgentHttpError::BadRequest("missing screenshot file".to_string()))?;
    let bytes = bytes.ok_or_else(|| AgentHttpError::BadRequest("missing screenshot file".to_string()))?;

    let core = state.core.lock().await;
    core.save_screenshot(file_name, bytes).await.map(Json).map_err(|e| AgentHttpError::BadRequest(e.to_string()))
}
