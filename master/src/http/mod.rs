pub mod agents;
pub mod error_logs;
pub mod runners;
pub mod screenshots;
pub mod stats;
pub mod tasks;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/urls/", get(tasks::list_tasks).post(tasks::create_tasks))
        .route("/urls/:id/", put(tasks::complete_task))
        .route("/url_tasks_length/", get(tasks::count_tasks))
        .route("/register_agent/", post(agents::register_agent))
        .route("/agents/", get(agents::list_agents))
        .route("/runner/:id/", get(runners::get_runner).post(runners::get_runner))
        .route("/register_runner/", post(runners::register_runner))
        .route("/log_error/", get(error_logs::list_error_logs).post(error_logs::create_error_log))
        .route("/screenshots/", get(screenshots::list_screenshots).post(screenshots::create_screenshot))
        .route("/screenshots/:id/", get(screenshots::get_screenshot))
        .route("/task_screenshots/:task_id/", get(screenshots::task_screenshots))
        .route("/stats/", get(stats::get_stats))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
