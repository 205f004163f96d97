//! `/screenshots/`, `/screenshots/{id}/`, `/task_screenshots/{task_id}/`
//! (§4.2). Upload is multipart; everything else is JSON except the raw
//! image bytes returned for a single screenshot.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use dispatch_core::Screenshot;

use crate::error::ApiError;
use crate::http::tasks::IdWindowQuery;
use crate::state::{now_unix, AppState};

pub async fn list_screenshots(
    State(state): State<AppState>,
    Query(window): Query<IdWindowQuery>,
) -> Result<Json<Vec<Screenshot>>, ApiError> {
    let shots = state.store.list_screenshots(window.into()).await?;
    Ok(Json(shots))
}

pub async fn create_screenshot(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Screenshot>), ApiError> {
    let mut task_id: Option<i64> = None;
    let mut file_name: Option<String> = None;
    let mut bytes: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::Validation(e.to_string()))? {
        match field.name().unwrap_or_default() {
            "task" => {
                let text = field.text().await.map_err(|e| ApiError::Validation(e.to_string()))?;
                task_id = text.parse().ok();
            }
            "screenshot" => {
                file_name = field.file_name().map(str::to_string);
                bytes = Some(field.bytes().await.map_err(|e| ApiError::Validation(e.to_string()))?);
            }
            _ => {}
        }
    }

    let task_id = task_id.ok_or_else(|| ApiError::Validation("missing 'task' field".to_string()))?;
    let file_name = file_name.ok_or_else(|| ApiError::Validation("missing screenshot file".to_string()))?;
    let bytes = bytes.ok_or_else(|| ApiError::Validation("missing screenshot file".to_string()))?;

    let screenshot = state.store.create_screenshot(task_id, file_name, bytes.to_vec(), now_unix()).await?;
    Ok((StatusCode::CREATED, Json(screenshot)))
}

pub async fn get_screenshot(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let shot = state.store.get_screenshot(id).await?.ok_or_else(|| ApiError::NotFound(format!("screenshot {id} not found")))?;
    let mime = shot.format().map(|f| f.mime_type()).unwrap_or("application/octet-stream");
    Ok(([(header::CONTENT_TYPE, mime)], shot.bytes).into_response())
}

pub async fn task_screenshots(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<Json<Vec<Screenshot>>, ApiError> {
    let shots = state.store.list_screenshots_for_task(task_id).await?;
    if shots.is_empty() {
        return Err(ApiError::NotFound(format!("no screenshots for task {task_id}")));
    }
    Ok(Json(shots))
}
