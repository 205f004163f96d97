//! `/log_error/` (§4.2): list or append a soft-failure note.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use dispatch_core::ErrorLog;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::{now_unix, AppState};

#[derive(Debug, Deserialize)]
pub struct NewErrorLogRequest {
    pub message: String,
    #[serde(default)]
    pub reporting_agent: Option<i64>,
    #[serde(default)]
    pub runner: Option<i64>,
}

pub async fn list_error_logs(State(state): State<AppState>) -> Result<Json<Vec<ErrorLog>>, ApiError> {
    let logs = state.store.list_error_logs().await?;
    Ok(Json(logs))
}

pub async fn create_error_log(
    State(state): State<AppState>,
    Json(req): Json<NewErrorLogRequest>,
) -> Result<(StatusCode, Json<ErrorLog>), ApiError> {
    let log = state.store.create_error_log(req.message, req.reporting_agent, req.runner, now_unix()).await?;
    Ok((StatusCode::CREATED, Json(log)))
}
