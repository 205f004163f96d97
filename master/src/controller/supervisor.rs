//! Per-agent supervision loop (§4.3, §5): one `tokio::spawn`ed task per
//! registered agent, polling at a fixed ~2s cadence until the agent
//! disappears from the Store or the process shuts down.

use std::time::Duration;

use dispatch_core::AgentState;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::controller::agent_client::{self, RunnerStatus};
use crate::controller::assignment;
use crate::state::{now_unix, AppState};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub async fn supervise_agent(state: AppState, agent_id: i64, mut shutdown: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_cycle(&state, agent_id).await {
                    warn!(agent_id, error = %e, "supervision cycle aborted: agent record gone");
                    break;
                }
            }
            _ = shutdown.recv() => {
                debug!(agent_id, "supervision task stopping on shutdown signal");
                break;
            }
        }
    }
}

async fn run_cycle(state: &AppState, agent_id: i64) -> anyhow::Result<()> {
    let Some(agent) = state.store.get_agent(agent_id).await? else {
        anyhow::bail!("agent {agent_id} no longer registered");
    };

    probe_status(state, agent_id, &agent.agent_url, agent.agent_state).await;

    // Re-fetch: the probe above may have rebound or cleared the agent's
    // task via the sweep/assignment paths.
    if let Some(agent) = state.store.get_agent(agent_id).await? {
        check_deadline(state, &agent).await;
    }

    Ok(())
}

async fn probe_status(state: &AppState, agent_id: i64, agent_url: &str, previous_state: AgentState) {
    debug!(agent_id, "checking agent status");

    let token = state.config.pymada_token_auth.as_deref();
    match agent_client::check_runner(&state.agent_client, agent_url, token).await {
        Err(e) => {
            warn!(agent_id, error = %e, "agent unreachable, marking LOST");
            let _ = state.store.set_agent_state(agent_id, AgentState::Lost, now_unix()).await;
        }
        Ok(None) => {
            // Agent answered with an unrecognized status; touch contact
            // time and leave the recorded state alone, same as the
            // original's "not in accepted_states" no-op.
            let _ = state.store.touch_agent_contact(agent_id, now_unix()).await;
        }
        Ok(Some(status)) => {
            let new_state = status.as_agent_state();
            let _ = state.store.touch_agent_contact(agent_id, now_unix()).await;

            if new_state != previous_state {
                debug!(agent_id, ?previous_state, ?new_state, "agent state changed");
                if let Err(e) = state.store.set_agent_state(agent_id, new_state, now_unix()).await {
                    warn!(agent_id, error = %e, "failed persisting agent state");
                    return;
                }

                if status == RunnerStatus::Idle {
                    on_transition_to_idle(state, agent_id, agent_url).await;
                }
            }
        }
    }
}

async fn on_transition_to_idle(state: &AppState, agent_id: i64, agent_url: &str) {
    let Ok(Some(agent)) = state.store.get_agent(agent_id).await else { return };

    if let Some(task_id) = agent.assigned_task {
        if let Ok(Some(task)) = state.store.get_task(task_id).await {
            if task.task_state == dispatch_core::TaskState::Assigned {
                assignment::sweep_failed_task(state, agent_id, task_id, state.config.max_task_retries).await;
            }
        }
    }

    assignment::assign_task(state, agent_id, agent_url).await;
}

async fn check_deadline(state: &AppState, agent: &dispatch_core::Agent) {
    let Some(task_id) = agent.assigned_task else { return };
    let Ok(Some(task)) = state.store.get_task(task_id).await else { return };

    if task.start_time == 0 {
        return;
    }

    let elapsed = now_unix().saturating_sub(task.start_time);
    if elapsed > state.config.max_task_duration_seconds {
        debug!(agent_id = agent.id, task_id, elapsed, "task exceeded deadline, killing run");
        let token = state.config.pymada_token_auth.as_deref();
        if let Err(e) = agent_client::kill_run(&state.agent_client, &agent.agent_url, token).await {
            warn!(agent_id = agent.id, error = %e, "kill_run call failed (best-effort)");
        }
    }
}
