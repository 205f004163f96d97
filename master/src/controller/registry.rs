//! Discovers registered agents by periodically scanning the Store and
//! spawns a supervision task for each one not already tracked (§4.3's
//! "registration is discovered by periodically scanning the Store").

use std::collections::HashMap;
use std::time::Duration;

use dispatch_core::IdWindow;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::controller::supervisor::supervise_agent;
use crate::state::AppState;

const SCAN_INTERVAL: Duration = Duration::from_secs(1);

pub async fn run(state: AppState, shutdown: broadcast::Sender<()>) {
    let mut tracked: HashMap<i64, JoinHandle<()>> = HashMap::new();
    let mut interval = tokio::time::interval(SCAN_INTERVAL);
    let mut shutdown_rx = shutdown.subscribe();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                scan_once(&state, &shutdown, &mut tracked).await;
            }
            _ = shutdown_rx.recv() => {
                debug!("registry scan loop stopping");
                for (_, handle) in tracked.drain() {
                    handle.abort();
                }
                break;
            }
        }
    }
}

async fn scan_once(state: &AppState, shutdown: &broadcast::Sender<()>, tracked: &mut HashMap<i64, JoinHandle<()>>) {
    let agents = match state.store.list_agents(IdWindow::default()).await {
        Ok(agents) => agents,
        Err(e) => {
            warn!(error = %e, "failed scanning agents for registry");
            return;
        }
    };

    for agent in &agents {
        tracked.entry(agent.id).or_insert_with(|| {
            debug!(agent_id = agent.id, "discovered agent, spawning supervision task");
            let state = state.clone();
            let rx = shutdown.subscribe();
            tokio::spawn(supervise_agent(state, agent.id, rx))
        });
    }

    let present: std::collections::HashSet<i64> = agents.iter().map(|a| a.id).collect();
    tracked.retain(|id, handle| {
        if present.contains(id) {
            true
        } else {
            handle.abort();
            false
        }
    });
}
