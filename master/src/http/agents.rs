//! `/register_agent/` and `/agents/` (§4.2).

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use dispatch_core::Agent;
use serde::Deserialize;

use crate::error::ApiError;
use crate::http::tasks::IdWindowQuery;
use crate::state::{now_unix, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub hostname: String,
    pub agent_url: String,
    #[serde(default)]
    pub runner_num: Option<i64>,
}

pub async fn register_agent(
    State(state): State<AppState>,
    Json(req): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    let (mut agent, created) = state.store.register_agent(req.hostname, req.agent_url, now_unix()).await?;

    if created {
        if let Some(runner_num) = req.runner_num {
            state.store.bind_agent_runner(agent.id, runner_num).await?;
            agent.assigned_runner = Some(runner_num);
        }
    }

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(agent)))
}

pub async fn list_agents(
    State(state): State<AppState>,
    Query(window): Query<IdWindowQuery>,
) -> Result<Json<Vec<Agent>>, ApiError> {
    let agents = state.store.list_agents(window.into()).await?;
    Ok(Json(agents))
}
