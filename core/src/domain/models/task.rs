//! The `UrlTask` entity: a unit of work identified by a URL.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Task`].
///
/// `QUEUED` -> `ASSIGNED` -> `{QUEUED, COMPLETE}`. A task only ever reaches
/// `COMPLETE` through a result upload or through retry exhaustion in the
/// failed-task sweep; there is no direct `QUEUED` -> `COMPLETE` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Queued,
    Assigned,
    Complete,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "QUEUED",
            TaskState::Assigned => "ASSIGNED",
            TaskState::Complete => "COMPLETE",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "QUEUED" => Some(TaskState::Queued),
            "ASSIGNED" => Some(TaskState::Assigned),
            "COMPLETE" => Some(TaskState::Complete),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit of work: fetch `url`, run the bound runner against it, upload a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub url: String,
    pub json_metadata: Option<String>,
    pub task_result: Option<String>,
    pub task_state: TaskState,
    pub assigned_agent: Option<i64>,
    pub fail_num: u32,
    /// Seconds since epoch; `0` while unassigned.
    pub start_time: u64,
    pub end_time: Option<u64>,
}

impl Task {
    /// Construct a freshly-queued task from a submission, matching the
    /// defaults the original record carries: zero fail count, unset
    /// start/end time, no bound agent.
    pub fn new_queued(id: i64, url: String, json_metadata: Option<String>) -> Self {
        Self {
            id,
            url,
            json_metadata,
            task_result: None,
            task_state: TaskState::Queued,
            assigned_agent: None,
            fail_num: 0,
            start_time: 0,
            end_time: None,
        }
    }

    /// Whether this task still has retry budget at the given ceiling.
    pub fn can_retry(&self, max_task_retries: u32) -> bool {
        self.fail_num < max_task_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_string() {
        for s in [TaskState::Queued, TaskState::Assigned, TaskState::Complete] {
            assert_eq!(TaskState::parse_str(s.as_str()), Some(s));
        }
    }

    #[test]
    fn parse_str_is_case_insensitive() {
        assert_eq!(TaskState::parse_str("queued"), Some(TaskState::Queued));
        assert_eq!(TaskState::parse_str("Assigned"), Some(TaskState::Assigned));
        assert_eq!(TaskState::parse_str("garbage"), None);
    }

    #[test]
    fn new_queued_has_zero_start_time_and_no_agent() {
        let t = Task::new_queued(1, "http://0".to_string(), None);
        assert_eq!(t.task_state, TaskState::Queued);
        assert_eq!(t.start_time, 0);
        assert!(t.assigned_agent.is_none());
        assert_eq!(t.fail_num, 0);
    }

    #[test]
    fn can_retry_respects_ceiling() {
        let mut t = Task::new_queued(1, "http://0".to_string(), None);
        t.fail_num = 2;
        assert!(t.can_retry(3));
        assert!(!t.can_retry(2));
    }
}
