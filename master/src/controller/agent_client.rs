//! Outbound HTTP calls the controller makes to an agent's local server
//! (§4.3, §4.4). Transport failures are the caller's problem to interpret
//! (mark LOST); a non-2xx response is logged but not retried, matching
//! the original `Control._send_request`'s single-attempt semantics — the
//! controller, unlike the agent's own outbound calls, does not retry.

use std::time::Duration;

use dispatch_core::Task;
use reqwest::RequestBuilder;
use serde::Deserialize;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

fn attach_auth(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.header(crate::auth::TOKEN_HEADER, token),
        None => builder,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    Idle,
    Running,
    NoRunner,
}

impl RunnerStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IDLE" => Some(Self::Idle),
            "RUNNING" => Some(Self::Running),
            "NO_RUNNER" => Some(Self::NoRunner),
            _ => None,
        }
    }

    pub fn as_agent_state(self) -> dispatch_core::AgentState {
        match self {
            RunnerStatus::Idle => dispatch_core::AgentState::Idle,
            RunnerStatus::Running => dispatch_core::AgentState::Running,
            RunnerStatus::NoRunner => dispatch_core::AgentState::NoRunner,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CheckRunnerResponse {
    status: String,
}

/// `POST /check_runner`. `Ok(None)` means the agent answered but with an
/// unrecognized status string; `Err` means the agent was unreachable.
pub async fn check_runner(client: &reqwest::Client, agent_url: &str, token: Option<&str>) -> reqwest::Result<Option<RunnerStatus>> {
    let url = format!("{agent_url}/check_runner");
    let resp = attach_auth(client.post(&url).timeout(REQUEST_TIMEOUT), token).send().await?;
    if !resp.status().is_success() {
        return Ok(None);
    }
    let body: CheckRunnerResponse = resp.json().await?;
    Ok(RunnerStatus::parse(&body.status))
}

/// `POST /start_run`. Returns `Ok(true)` on any 2xx response, `Ok(false)`
/// on a non-2xx response (protocol error, not retried), `Err` on a
/// transport failure.
pub async fn start_run(client: &reqwest::Client, agent_url: &str, task: &Task, token: Option<&str>) -> reqwest::Result<bool> {
    let url = format!("{agent_url}/start_run");
    let resp = attach_auth(client.post(&url).timeout(REQUEST_TIMEOUT), token).json(task).send().await?;
    Ok(resp.status().is_success())
}

/// `POST /kill_run`, best-effort per §4.3's deadline check. Transport and
/// protocol failures are both swallowed by the caller; this call never
/// blocks the supervision cycle on a dead agent.
pub async fn kill_run(client: &reqwest::Client, agent_url: &str, token: Option<&str>) -> reqwest::Result<()> {
    let url = format!("{agent_url}/kill_run");
    attach_auth(client.post(&url).timeout(REQUEST_TIMEOUT), token).send().await?;
    Ok(())
}
