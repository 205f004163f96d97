//! `/urls/` and `/url_tasks_length/`: task submission, listing, result
//! upload, and counting (§4.2).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use dispatch_core::{IdWindow, NewTask, Task, TaskState};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::{now_unix, AppState};

#[derive(Debug, Deserialize)]
pub struct IdWindowQuery {
    pub min_id: Option<i64>,
    pub max_id: Option<i64>,
}

impl From<IdWindowQuery> for IdWindow {
    fn from(q: IdWindowQuery) -> Self {
        IdWindow { min_id: q.min_id, max_id: q.max_id }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewTaskRequest {
    pub url: String,
    #[serde(default)]
    pub json_metadata: Option<String>,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(window): Query<IdWindowQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state.store.list_tasks(window.into()).await?;
    Ok(Json(tasks))
}

pub async fn create_tasks(
    State(state): State<AppState>,
    Json(requests): Json<Vec<NewTaskRequest>>,
) -> Result<(StatusCode, Json<Vec<Task>>), ApiError> {
    let inputs = requests.into_iter().map(|r| NewTask { url: r.url, json_metadata: r.json_metadata }).collect();
    let created = state.store.create_tasks(inputs).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Body accepted by `PUT /urls/{id}/`. The agent PUTs the whole task
/// record it was given plus a populated `task_result`; every other field
/// is ignored here because the PUT unconditionally sets COMPLETE
/// regardless of what else is in the payload (§4.2).
#[derive(Debug, Deserialize, Default)]
pub struct TaskResultPayload {
    #[serde(default)]
    pub task_result: Option<String>,
}

pub async fn complete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<TaskResultPayload>,
) -> Result<Json<Task>, ApiError> {
    let task = state.store.complete_task_with_result(id, payload.task_result, now_unix()).await?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub state: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct CountResponse {
    pub url_tasks: u64,
}

pub async fn count_tasks(
    State(state): State<AppState>,
    Query(query): Query<CountQuery>,
) -> Result<Json<CountResponse>, ApiError> {
    // An unrecognized state string is treated as "no filter", matching the
    // original view's silent fallthrough rather than a 400.
    let filter = query.state.as_deref().and_then(TaskState::parse_str);
    let count = state.store.count_tasks(filter).await?;
    Ok(Json(CountResponse { url_tasks: count }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_state_string_parses_to_none() {
        assert_eq!(TaskState::parse_str("bogus"), None);
        assert_eq!(TaskState::parse_str("queued"), Some(TaskState::Queued));
    }
}
