//! Shared-secret authentication on the agent's own HTTP surface, mirroring
//! the master's: active only when `PYMADA_TOKEN_AUTH` is configured.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AgentHttpError;
use crate::state::AppState;

pub const TOKEN_HEADER: &str = "pymada_token_auth";

pub async fn require_token(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, AgentHttpError> {
    let Some(expected) = state.config.pymada_token_auth.as_deref() else {
        return Ok(next.run(req).await);
    };

    let supplied = req.headers().get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    match supplied {
        Some(token) if token == expected => Ok(next.run(req).await),
        _ => Err(AgentHttpError::Unauthorized),
    }
}
