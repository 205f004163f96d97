//! The agent's local state machine (§4.4): the single current task, the
//! runner process binding, and the one-shot dependency installer child.
//! Exactly one of these exists per agent process; the HTTP layer just
//! locks and delegates to it.

use std::path::{Path, PathBuf};

use dispatch_core::{Runner, Task};
use serde_json::Value;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::master_client::MasterClient;
use crate::runner::{RunnerProcess, RunnerStatus};

/// What `/check_runner` reports, folding in the "dependency install still
/// running" and "no runner fetched yet" cases the bare [`RunnerStatus`]
/// doesn't carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRunnerStatus {
    Idle,
    Running,
    NoRunner,
}

impl CheckRunnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckRunnerStatus::Idle => "IDLE",
            CheckRunnerStatus::Running => "RUNNING",
            CheckRunnerStatus::NoRunner => "NO_RUNNER",
        }
    }
}

pub struct AgentCore {
    master: MasterClient,
    working_dir: PathBuf,
    task: Option<Task>,
    runner: Option<RunnerProcess>,
    registered_num: Option<i64>,
    runner_num: i64,
    dep_install_process: Option<Child>,
}

impl AgentCore {
    pub fn new(config: &AgentConfig, working_dir: PathBuf) -> Self {
        Self {
            master: MasterClient::new(config),
            working_dir,
            task: None,
            runner: None,
            registered_num: None,
            runner_num: config.runner_num,
            dep_install_process: None,
        }
    }

    pub fn registered_num(&self) -> Option<i64> {
        self.registered_num
    }

    /// `POST /register_agent/` followed by the initial runner fetch, run
    /// once at startup unless the operator passed `--no-autoregister`.
    pub async fn register_and_fetch_runner(&mut self, hostname: String, self_url: String) -> anyhow::Result<()> {
        let agent = self.master.register_agent(hostname, self_url, self.runner_num).await?;
        info!(agent_id = agent.id, "registered with master");
        self.registered_num = Some(agent.id);

        self.fetch_runner(self.runner_num).await
    }

    /// `GET /runner/{id}/`, then write the runner to disk and (if it
    /// carries a dependency manifest) spawn the type-specific install
    /// command as a separate child before binding the runner.
    pub async fn fetch_runner(&mut self, runner_num: i64) -> anyhow::Result<()> {
        let runner = self.master.get_runner(runner_num).await?;
        debug!(runner_id = runner.id, "fetched runner");

        if let Some(dep_file) = runner.dependency_file.clone() {
            self.install_dependencies(&dep_file, &runner)?;
        }

        self.save_runner(runner);
        Ok(())
    }

    /// Write a runner's contents to its working-directory file and bind
    /// it, matching `Agent.save_runner`. Used both by the startup fetch
    /// and by the `/assign_runner` push endpoint.
    pub fn save_runner(&mut self, runner: Runner) {
        let file_path = self.working_dir.join(&runner.file_name);
        if let Err(e) = std::fs::write(&file_path, &runner.contents) {
            warn!(error = %e, path = %file_path.display(), "failed writing runner file");
            return;
        }

        self.runner_num = runner.id;
        self.runner = Some(RunnerProcess::new(file_path, self.working_dir.clone(), runner.file_type, runner.custom_executable));
    }

    fn install_dependencies(&mut self, dep_file: &str, runner: &Runner) -> anyhow::Result<()> {
        let manifest_path = self.working_dir.join(runner.file_type.manifest_file_name());
        std::fs::write(&manifest_path, dep_file)?;

        info!(command = runner.file_type.install_command(), "installing runner dependencies");
        let child = spawn_shell(runner.file_type.install_command(), &self.working_dir)?;
        self.dep_install_process = Some(child);
        Ok(())
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    /// `/start_run`: bind the incoming task and launch the runner against
    /// it. Returns an error if no runner has been fetched yet.
    pub fn start_run(&mut self, task: Task) -> Result<(), &'static str> {
        let Some(runner) = self.runner.as_mut() else {
            return Err("no runner available");
        };

        self.task = Some(task);
        if let Err(e) = runner.run() {
            warn!(error = %e, "failed to spawn runner process");
            return Err("failed to spawn runner process");
        }

        Ok(())
    }

    pub async fn kill_run(&mut self) -> Result<(), &'static str> {
        let Some(runner) = self.runner.as_mut() else {
            return Err("no runner available");
        };
        runner.kill().await;
        Ok(())
    }

    /// `/check_runner`: if no runner has been fetched yet, retries the
    /// fetch before answering (matching `Agent.check_runner`'s
    /// `self.get_runner()` side effect on a `None` runner) — a failed
    /// fetch just means the next poll tries again. Otherwise reaps the
    /// dependency installer first (a live installer forces NO_RUNNER),
    /// then polls the runner's child process.
    pub async fn check_runner(&mut self) -> CheckRunnerStatus {
        if self.runner.is_none() {
            if let Err(e) = self.fetch_runner(self.runner_num).await {
                warn!(error = %e, "retry fetching runner failed");
            }
            return CheckRunnerStatus::NoRunner;
        }

        if let Some(dep_process) = self.dep_install_process.as_mut() {
            match dep_process.try_wait() {
                Ok(Some(_)) => self.dep_install_process = None,
                Ok(None) => return CheckRunnerStatus::NoRunner,
                Err(_) => self.dep_install_process = None,
            }
        }

        match self.runner.as_mut().expect("checked above").status() {
            RunnerStatus::Idle => CheckRunnerStatus::Idle,
            RunnerStatus::Running => CheckRunnerStatus::Running,
        }
    }

    /// `/save_results`: attach the result to the bound task and PUT it
    /// back to master, then clear the binding regardless of outcome —
    /// matching `Agent.save_task_results`'s unconditional `self.task = None`.
    pub async fn save_task_results(&mut self, result: Value) -> Result<(), &'static str> {
        let Some(mut task) = self.task.take() else {
            return Err("no current task");
        };

        task.task_result = Some(match result {
            Value::String(s) => s,
            other => other.to_string(),
        });

        let body = serde_json::to_value(&task).expect("Task always serializes");
        if let Err(e) = self.master.put_task_result(task.id, &body).await {
            warn!(task_id = task.id, error = %e, "error saving task result");
        }

        Ok(())
    }

    /// `/save_screenshot`: relay an uploaded image to master, bound to the
    /// currently-assigned task.
    pub async fn save_screenshot(&self, file_name: String, bytes: Vec<u8>) -> Result<Value, &'static str> {
        let Some(task) = self.task.as_ref() else {
            return Err("no current task");
        };

        self.master.upload_screenshot(task.id, file_name, bytes).await.map_err(|e| {
            warn!(error = %e, "error saving screenshot");
            "error saving screenshot"
        })
    }

    pub async fn add_url(&self, url: String, json_metadata: Option<String>) -> anyhow::Result<Value> {
        #[derive(serde::Serialize)]
        struct NewUrl {
            url: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            json_metadata: Option<String>,
        }

        Ok(self.master.add_url(&NewUrl { url, json_metadata }).await?)
    }

    pub async fn log_error(&self, message: String) -> anyhow::Result<Value> {
        #[derive(serde::Serialize)]
        struct NewErrorLog {
            message: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            reporting_agent: Option<i64>,
            runner: i64,
        }

        Ok(self
            .master
            .log_error(&NewErrorLog { message, reporting_agent: self.registered_num, runner: self.runner_num })
            .await?)
    }
}

fn spawn_shell(command: &str, cwd: &Path) -> std::io::Result<Child> {
    #[cfg(unix)]
    {
        Command::new("sh").arg("-c").arg(command).current_dir(cwd).kill_on_drop(true).spawn()
    }
    #[cfg(not(unix))]
    {
        Command::new("cmd").arg("/C").arg(command).current_dir(cwd).kill_on_drop(true).spawn()
    }
}
