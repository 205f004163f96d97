//! `/stats/` (§4.2): aggregate counters for dashboards and S4's assertion.

use axum::extract::State;
use axum::Json;
use dispatch_core::Stats;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<Stats>, ApiError> {
    let stats = state.store.stats().await?;
    Ok(Json(stats))
}
