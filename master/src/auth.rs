//! Shared-secret authentication (§4.2). Active only when the master is
//! configured with `PYMADA_TOKEN_AUTH`; otherwise every request passes
//! (dev mode), matching `EnvTokenAuth`'s behavior when the env var is unset.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AppState;

pub const TOKEN_HEADER: &str = "pymada_token_auth";

pub async fn require_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.pymada_token_auth.as_deref() else {
        return Ok(next.run(req).await);
    };

    let supplied = req.headers().get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    match supplied {
        Some(token) if token == expected => Ok(next.run(req).await),
        _ => Err(ApiError::Unauthorized),
    }
}
