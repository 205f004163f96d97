//! `/register_runner/` and `/runner/{id}/` (§4.2). The fetch endpoint
//! accepts both GET and POST with identical behavior, matching the
//! original dual-verb handler (§9 supplement).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use dispatch_core::{NewRunner, Runner, RunnerType};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewRunnerRequest {
    pub contents: String,
    pub file_name: String,
    pub file_type: String,
    #[serde(default)]
    pub custom_executable: Option<String>,
    #[serde(default)]
    pub dependency_file: Option<String>,
}

pub async fn register_runner(
    State(state): State<AppState>,
    Json(req): Json<NewRunnerRequest>,
) -> Result<(StatusCode, Json<Runner>), ApiError> {
    let file_type = RunnerType::parse_str(&req.file_type)
        .ok_or_else(|| ApiError::Validation(format!("unknown runner file_type '{}'", req.file_type)))?;

    let runner = state
        .store
        .create_runner(NewRunner {
            contents: req.contents,
            file_name: req.file_name,
            file_type,
            custom_executable: req.custom_executable,
            dependency_file: req.dependency_file,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(runner)))
}

pub async fn get_runner(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Runner>, ApiError> {
    let runner = state.store.get_runner(id).await?.ok_or_else(|| ApiError::NotFound(format!("runner {id} not found")))?;
    Ok(Json(runner))
}
