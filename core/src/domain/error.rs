//! Domain-level errors shared by every Store implementation and surfaced,
//! translated, at the HTTP API boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("task not found: {0}")]
    TaskNotFound(i64),

    #[error("agent not found: {0}")]
    AgentNotFound(i64),

    #[error("runner not found: {0}")]
    RunnerNotFound(i64),

    #[error("screenshot not found: {0}")]
    ScreenshotNotFound(i64),

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
