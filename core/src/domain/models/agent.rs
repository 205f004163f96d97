//! The `Agent` entity: one worker process, one child runner.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an [`Agent`], as reported by its `/check_runner` probe
/// or inferred by the controller when the agent is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentState {
    Idle,
    Running,
    /// Bound to a task the controller just assigned, before the agent has
    /// reported back RUNNING.
    Assigned,
    NoRunner,
    Lost,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "IDLE",
            AgentState::Running => "RUNNING",
            AgentState::Assigned => "ASSIGNED",
            AgentState::NoRunner => "NO_RUNNER",
            AgentState::Lost => "LOST",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "IDLE" => Some(AgentState::Idle),
            "RUNNING" => Some(AgentState::Running),
            "ASSIGNED" => Some(AgentState::Assigned),
            "NO_RUNNER" => Some(AgentState::NoRunner),
            "LOST" => Some(AgentState::Lost),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered worker process. `(hostname, agent_url)` is unique; repeated
/// registration with the same pair returns the existing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub hostname: String,
    pub agent_state: AgentState,
    /// Seconds since epoch of the last master -> agent contact attempt.
    pub last_contact_attempt: u64,
    pub agent_url: String,
    pub assigned_task: Option<i64>,
    pub assigned_runner: Option<i64>,
}

impl Agent {
    pub fn new(id: i64, hostname: String, agent_url: String, now: u64) -> Self {
        Self {
            id,
            hostname,
            agent_state: AgentState::NoRunner,
            last_contact_attempt: now,
            agent_url,
            assigned_task: None,
            assigned_runner: None,
        }
    }

    pub fn is_bound_to_task(&self) -> bool {
        self.assigned_task.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_string() {
        for s in [
            AgentState::Idle,
            AgentState::Running,
            AgentState::Assigned,
            AgentState::NoRunner,
            AgentState::Lost,
        ] {
            assert_eq!(AgentState::parse_str(s.as_str()), Some(s));
        }
    }

    #[test]
    fn new_agent_starts_no_runner_with_no_bindings() {
        let a = Agent::new(1, "host".to_string(), "http://127.0.0.1:5001".to_string(), 100);
        assert_eq!(a.agent_state, AgentState::NoRunner);
        assert!(!a.is_bound_to_task());
        assert_eq!(a.last_contact_attempt, 100);
    }
}
