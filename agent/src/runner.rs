//! Runner child-process lifecycle (§4.4). Mirrors the teacher's
//! `tokio::process::Child` handling in `claude_code.rs`: non-blocking status
//! via `try_wait`, `kill_on_drop` so an agent crash never leaves an orphan,
//! `start_kill` for the deadline-triggered termination path.

use std::path::PathBuf;

use dispatch_core::RunnerType;
use tokio::process::{Child, Command};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    Idle,
    Running,
}

impl RunnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerStatus::Idle => "IDLE",
            RunnerStatus::Running => "RUNNING",
        }
    }
}

/// One launched runner script: its interpreter, file path, and the single
/// in-flight child process (if any). A runner is reused across tasks —
/// `run` just spawns a fresh child each time the previous one has exited.
pub struct RunnerProcess {
    executable: String,
    file_path: PathBuf,
    working_dir: PathBuf,
    child: Option<Child>,
    last_run_code: Option<i32>,
}

impl RunnerProcess {
    pub fn new(file_path: PathBuf, working_dir: PathBuf, file_type: RunnerType, custom_executable: Option<String>) -> Self {
        let executable = custom_executable.unwrap_or_else(|| file_type.default_executable().to_string());
        Self { executable, file_path, working_dir, child: None, last_run_code: None }
    }

    /// Spawns the runner against the current task if nothing is already
    /// running. A second call while a child is live is a no-op, matching
    /// the original `Runner.run`'s `if self.process is None` guard.
    pub fn run(&mut self) -> std::io::Result<()> {
        if self.child.is_some() {
            return Ok(());
        }

        let mut command = Command::new(&self.executable);
        command.arg(&self.file_path).current_dir(&self.working_dir).kill_on_drop(true);

        debug!(executable = %self.executable, file = %self.file_path.display(), "spawning runner");
        let child = command.spawn()?;
        self.child = Some(child);
        Ok(())
    }

    /// Polls the child without blocking. Reaps and clears it on exit,
    /// recording its status code, matching `Runner.get_status`'s
    /// `poll()`-then-clear semantics.
    pub fn status(&mut self) -> RunnerStatus {
        let Some(child) = self.child.as_mut() else {
            return RunnerStatus::Idle;
        };

        match child.try_wait() {
            Ok(Some(exit_status)) => {
                self.last_run_code = exit_status.code();
                self.child = None;
                RunnerStatus::Idle
            }
            Ok(None) => RunnerStatus::Running,
            Err(_) => {
                self.child = None;
                RunnerStatus::Idle
            }
        }
    }

    pub fn last_run_code(&self) -> Option<i32> {
        self.last_run_code
    }

    /// Best-effort termination; `status` will observe the exit on the next poll.
    pub async fn kill(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}
