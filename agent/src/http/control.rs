//! The controller-facing surface (§4.3): `/start_run`, `/kill_run`,
//! `/check_runner`, plus `/assign_runner` for a runner pushed directly
//! rather than pulled at startup.

use axum::extract::State;
use axum::Json;
use dispatch_core::{Runner, Task};
use serde_json::{json, Value};

use crate::error::AgentHttpError;
use crate::state::AppState;

pub async fn start_run(State(state): State<AppState>, Json(task): Json<Task>) -> Result<Json<Value>, AgentHttpError> {
    let mut core = state.core.lock().await;
    core.start_run(task).map_err(|_| AgentHttpError::NoRunner)?;
    Ok(Json(json!({})))
}

pub async fn kill_run(State(state): State<AppState>) -> Result<Json<Value>, AgentHttpError> {
    let mut core = state.core.lock().await;
    core.kill_run().await.map_err(|_| AgentHttpError::NoRunner)?;
    Ok(Json(json!({})))
}

pub async fn check_runner(State(state): State<AppState>) -> Json<Value> {
    let mut core = state.core.lock().await;
    let status = core.check_runner().await;
    Json(json!({ "status": status.as_str() }))
}

pub async fn assign_runner(State(state): State<AppState>, Json(runner): Json<Runner>) -> Json<Value> {
    let mut core = state.core.lock().await;
    core.save_runner(runner);
    Json(json!({}))
}
