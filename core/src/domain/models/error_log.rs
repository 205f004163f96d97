//! The `ErrorLog` entity: a soft-failure note filed by a runner or agent.

use serde::{Deserialize, Serialize};

/// A message logged by a runner (via `/log_error`) or an agent, without
/// affecting the state of any task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLog {
    pub id: i64,
    pub message: String,
    pub reporting_agent: Option<i64>,
    pub runner: Option<i64>,
    /// Wall-clock time set on insertion, seconds since epoch.
    pub timestamp: u64,
}

impl ErrorLog {
    pub fn new(id: i64, message: String, reporting_agent: Option<i64>, runner: Option<i64>, timestamp: u64) -> Self {
        Self { id, message, reporting_agent, runner, timestamp }
    }
}
