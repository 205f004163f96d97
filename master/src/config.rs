//! Master process configuration: defaults, layered with environment
//! variables and CLI flags. The environment variable names in the
//! specification (`MASTER_ADDR`, `PYMADA_TOKEN_AUTH`, ...) do not share a
//! common prefix, so each is merged individually via `Env::raw().only(&[..])`
//! rather than one blanket `Env::prefixed(...)` the way a single-namespace
//! config would.

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

/// Fully resolved master configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    pub master_addr: String,
    pub master_port: u16,
    pub database_url: String,
    pub pymada_token_auth: Option<String>,
    pub max_task_duration_seconds: u64,
    pub max_task_retries: u32,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Directory for rotating log files. Stdout logging always stays on;
    /// this only adds a second, JSON-formatted file sink alongside it.
    pub log_dir: Option<String>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            master_addr: "0.0.0.0".to_string(),
            master_port: 8000,
            database_url: "sqlite://pymada.db".to_string(),
            pymada_token_auth: None,
            max_task_duration_seconds: 300,
            max_task_retries: 3,
            log_level: "INFO".to_string(),
            log_format: LogFormat::default(),
            log_dir: None,
        }
    }
}

impl MasterConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.master_addr, self.master_port)
    }
}

/// CLI surface for operators who prefer flags over bare environment
/// variables. Every flag also reads its matching env var via clap's `env`
/// attribute, so `--help` documents the full configuration surface in one
/// place.
#[derive(Debug, Parser, Serialize)]
#[command(name = "dispatch-master", about = "Master coordinator for the dispatch task-dispatch service")]
pub struct Cli {
    #[arg(long, env = "MASTER_ADDR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_addr: Option<String>,

    #[arg(long, env = "MASTER_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_port: Option<u16>,

    #[arg(long, env = "DATABASE_URL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[arg(long, env = "PYMADA_TOKEN_AUTH")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pymada_token_auth: Option<String>,

    #[arg(long, env = "PYMADA_MAX_TASK_DURATION_SECONDS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_task_duration_seconds: Option<u64>,

    #[arg(long, env = "PYMADA_MAX_TASK_RETRIES")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_task_retries: Option<u32>,

    #[arg(long, env = "LOG_LEVEL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[arg(long, env = "LOG_FORMAT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,

    #[arg(long, env = "LOG_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

const ENV_VAR_NAMES: &[&str] = &[
    "MASTER_ADDR",
    "MASTER_PORT",
    "DATABASE_URL",
    "PYMADA_TOKEN_AUTH",
    "PYMADA_MAX_TASK_DURATION_SECONDS",
    "PYMADA_MAX_TASK_RETRIES",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "LOG_DIR",
];

/// Assemble the final configuration: programmatic defaults, then the
/// exactly-named environment variables from §6, then whatever the CLI
/// parsed (which itself already folded in the same env vars via clap, so
/// this layer wins only when a flag was passed explicitly).
pub fn load(cli: &Cli) -> anyhow::Result<MasterConfig> {
    let config: MasterConfig = Figment::new()
        .merge(Serialized::defaults(MasterConfig::default()))
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
        let config = MasterConfig::default();
        assert_eq!(config.master_addr, "0.0.0.0");
        assert_eq!(config.master_port, 8000);
        assert_eq!(config.max_task_duration_seconds, 300);
        assert_eq!(config.max_task_retries, 3);
        assert!(config.pymada_token_auth.is_none());
    }

    #[test]
    fn cli_override_wins_over_default() {
        let cli = Cli {
            master_addr: None,
            master_port: Some(9000),
            database_url: None,
            pymada_token_auth: None,
            max_task_duration_seconds: None,
            max_task_retries: None,
            log_level: None,
            log_format: None,
            log_dir: None,
        };
        let config = load(&cli).unwrap();
        assert_eq!(config.master_port, 9000);
    }

    #[test]
    fn log_format_defaults_to_pretty() {
        let config = MasterConfig::default();
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
