//! Tracing setup shared by the master binary. `LOG_LEVEL` seeds the
//! default filter directive; `RUST_LOG`, when present, overrides it via
//! `EnvFilter`'s usual env-var precedence. `log_format` picks JSON or
//! pretty stdout rendering; `log_dir`, if set, adds a second sink that
//! writes daily-rotated JSON files alongside whatever goes to stdout.

use crate::config::LogFormat;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initializes the global subscriber. The returned guard flushes the
/// non-blocking file writer on drop and must be held for the process
/// lifetime; dropping it early truncates buffered log lines.
pub fn init(log_level: &str, log_format: LogFormat, log_dir: Option<&str>) -> Option<WorkerGuard> {
    let default_directive = log_level.to_lowercase();
    let env_filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive.clone()));

    let stdout_layer = match log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_target(true).boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().with_target(true).boxed(),
    }
    .with_filter(env_filter());

    match log_dir {
        Some(dir) => {
            let file_appender = rolling::daily(dir, "dispatch-master.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true)
                .with_filter(env_filter());

            tracing_subscriber::registry().with(stdout_layer).with(file_layer).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stdout_layer).init();
            None
        }
    }
}
