//! Shared application state handed to every handler on the agent's local
//! HTTP server.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::agent_core::AgentCore;
use crate::config::AgentConfig;

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<Mutex<AgentCore>>,
    pub config: Arc<AgentConfig>,
}

impl AppState {
    pub fn new(core: AgentCore, config: AgentConfig) -> Self {
        Self { core: Arc::new(Mutex::new(core)), config: Arc::new(config) }
    }
}
