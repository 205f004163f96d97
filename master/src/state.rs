//! Shared application state handed to every HTTP handler and the controller.

use std::sync::Arc;

use dispatch_core::Store;
use tokio::sync::Mutex;

use crate::config::MasterConfig;

/// Cloned cheaply (everything inside is already `Arc`-backed); shared
/// between the axum router and the controller's supervision tasks.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<MasterConfig>,
    /// The process-wide assign lock (§5): held only across next-queued
    /// lookup + task/agent bind, never across outbound HTTP.
    pub assign_lock: Arc<Mutex<()>>,
    pub agent_client: reqwest::Client,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: MasterConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            assign_lock: Arc::new(Mutex::new(())),
            agent_client: reqwest::Client::new(),
        }
    }
}

pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}
