pub mod control;
pub mod relay;
pub mod task;

use axum::middleware;
use axum::routing::post;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get_task", post(task::get_task))
        .route("/save_results", post(task::save_results))
        .route("/save_screenshot", post(task::save_screenshot))
        .route("/assign_runner", post(control::assign_runner))
        .route("/start_run", post(control::start_run))
        .route("/kill_run", post(control::kill_run))
        .route("/check_runner", post(control::check_runner))
        .route("/add_url", post(relay::add_url))
        .route("/log_error", post(relay::log_error))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
