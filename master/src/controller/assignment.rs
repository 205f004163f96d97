//! Task assignment and the failed-task sweep (§4.3).

use dispatch_core::AgentState;
use tracing::{debug, error, info, warn};

use crate::controller::agent_client;
use crate::state::{now_unix, AppState};

/// Claim the next-queued task under the assign lock, release it, then make
/// the outbound `/start_run` call. Rolls back on any non-success response
/// or transport failure.
pub async fn assign_task(state: &AppState, agent_id: i64, agent_url: &str) {
    let claimed = {
        let _guard = state.assign_lock.lock().await;
        match state.store.claim_next_queued_task_for_agent(agent_id, now_unix()).await {
            Ok(task) => task,
            Err(e) => {
                error!(agent_id, error = %e, "failed claiming next queued task");
                return;
            }
        }
    };

    let Some(task) = claimed else { return };

    info!(agent_id, task_id = task.id, "assigning task to agent");

    let token = state.config.pymada_token_auth.as_deref();
    let start_ok = match agent_client::start_run(&state.agent_client, agent_url, &task, token).await {
        Ok(ok) => ok,
        Err(e) => {
            warn!(agent_id, task_id = task.id, error = %e, "unreachable while starting run, rolling back");
            false
        }
    };

    if !start_ok {
        if let Err(e) = state.store.rollback_assignment(task.id, agent_id, now_unix()).await {
            error!(agent_id, task_id = task.id, error = %e, "failed to roll back assignment");
        }
    }
}

/// Reconcile an agent that just transitioned to IDLE while still bound to
/// a task whose state is still ASSIGNED: the runner exited without
/// uploading a result.
pub async fn sweep_failed_task(state: &AppState, agent_id: i64, task_id: i64, max_task_retries: u32) {
    debug!(agent_id, task_id, "sweeping possibly-failed task");
    match state.store.sweep_failed_task(task_id, agent_id, max_task_retries).await {
        Ok(Some(task)) => {
            info!(agent_id, task_id = task.id, fail_num = task.fail_num, new_state = %task.task_state, "swept task");
        }
        Ok(None) => {}
        Err(e) => error!(agent_id, task_id, error = %e, "failed sweeping task"),
    }
}

pub fn state_transitioned_to_idle(previous: AgentState, new: AgentState) -> bool {
    previous != AgentState::Idle && new == AgentState::Idle
}
