//! The control loop (§4.3): per-agent supervision, task assignment, the
//! failed-task sweep, and deadline enforcement.

pub mod agent_client;
pub mod assignment;
pub mod registry;
pub mod supervisor;

use tokio::sync::broadcast;

use crate::state::AppState;

/// Spawn the registry scan loop, which in turn spawns one supervision
/// task per discovered agent. Returns the shutdown sender; dropping or
/// firing it stops every supervision task and the registry loop itself.
pub fn spawn(state: AppState) -> broadcast::Sender<()> {
    let (shutdown_tx, _) = broadcast::channel(1);
    let registry_shutdown = shutdown_tx.clone();
    tokio::spawn(registry::run(state, registry_shutdown));
    shutdown_tx
}
