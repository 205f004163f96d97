//! Agent process configuration (§6). Mirrors the master's figment+clap
//! layering: defaults, then the exactly-named environment variables, then
//! whatever the CLI parsed.

use clap::Parser;
use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Stdout/file output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Pretty
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("invalid log format: {other} (expected \"json\" or \"pretty\")")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub master_url: String,
    pub agent_addr: String,
    pub agent_port: u16,
    pub runner_num: i64,
    pub pymada_token_auth: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_dir: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            master_url: "http://localhost:8000".to_string(),
            agent_addr: "127.0.0.1".to_string(),
            agent_port: 5001,
            runner_num: 1,
            pymada_token_auth: None,
            log_level: "INFO".to_string(),
            log_format: LogFormat::default(),
            log_dir: None,
        }
    }
}

impl AgentConfig {
    /// The URL the master should reach this agent at, as registered.
    pub fn self_url(&self) -> String {
        format!("http://{}:{}", self.agent_addr, self.agent_port)
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.agent_port)
    }
}

#[derive(Debug, Parser, Serialize)]
#[command(name = "dispatch-agent", about = "Worker agent for the dispatch task-dispatch service")]
pub struct Cli {
    #[arg(long, env = "MASTER_URL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_url: Option<String>,

    #[arg(long, env = "AGENT_ADDR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_addr: Option<String>,

    #[arg(long, env = "AGENT_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_port: Option<u16>,

    #[arg(long, env = "RUNNER_NUM")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_num: Option<i64>,

    #[arg(long, env = "PYMADA_TOKEN_AUTH")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pymada_token_auth: Option<String>,

    #[arg(long, env = "LOG_LEVEL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[arg(long, env = "LOG_FORMAT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,

    #[arg(long, env = "LOG_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Skip the startup `/register_agent/` + runner fetch. Used by tests
    /// that drive the agent's HTTP surface directly.
    #[arg(long)]
    pub no_autoregister: bool,
}

const ENV_VAR_NAMES: &[&str] =
    &["MASTER_URL", "AGENT_ADDR", "AGENT_PORT", "RUNNER_NUM", "PYMADA_TOKEN_AUTH", "LOG_LEVEL", "LOG_FORMAT", "LOG_DIR"];

pub fn load(cli: &Cli) -> anyhow::Result<AgentConfig> {
    let config: AgentConfig = Figment::new()
        .merge(Serialized::defaults(AgentConfig::default()))
        .merge(Env::raw().only(ENV_VAR_NAMES))
        .merge(Serialized::defaults(cli))
        .extract()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = AgentConfig::default();
        assert_eq!(config.master_url, "http://localhost:8000");
        assert_eq!(config.agent_addr, "127.0.0.1");
        assert_eq!(config.agent_port, 5001);
        assert_eq!(config.runner_num, 1);
    }

    #[test]
    fn self_url_combines_addr_and_port() {
        let config = AgentConfig::default();
        assert_eq!(config.self_url(), "http://127.0.0.1:5001");
    }

    #[test]
    fn log_format_defaults_to_pretty() {
        let config = AgentConfig::default();
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn log_format_parses_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
