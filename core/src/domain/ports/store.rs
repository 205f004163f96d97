//! The `Store` port: durable CRUD over every entity in the data model,
//! plus the handful of operations that must be atomic for the controller's
//! invariants (§8 of the specification) to hold.

use async_trait::async_trait;

use crate::domain::error::DomainResult;
use crate::domain::models::{Agent, AgentState, ErrorLog, Runner, Screenshot, Task, TaskState};

/// Optional `min_id`/`max_id` window for list endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdWindow {
    pub min_id: Option<i64>,
    pub max_id: Option<i64>,
}

/// Fields accepted when bulk-creating tasks via `POST /urls/`.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub url: String,
    pub json_metadata: Option<String>,
}

/// Fields accepted when uploading a runner via `POST /register_runner/`.
#[derive(Debug, Clone)]
pub struct NewRunner {
    pub contents: String,
    pub file_name: String,
    pub file_type: crate::domain::models::RunnerType,
    pub custom_executable: Option<String>,
    pub dependency_file: Option<String>,
}

/// Aggregate counters backing `GET /stats/`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Stats {
    pub urls: u64,
    pub urls_queued: u64,
    pub urls_assigned: u64,
    pub urls_complete: u64,
    pub urls_failed_min_once: u64,
    pub errors_logged: u64,
    pub registered_agents: u64,
}

/// Persistence port for every entity in the data model. Implemented by a
/// SQLite-backed store (production) and an in-memory store (tests); both
/// must honor the atomicity contracts documented per method.
#[async_trait]
pub trait Store: Send + Sync {
    // ---- Task ---------------------------------------------------------

    /// Bulk-create tasks, each starting QUEUED with `fail_num = 0`.
    async fn create_tasks(&self, inputs: Vec<NewTask>) -> DomainResult<Vec<Task>>;

    async fn get_task(&self, id: i64) -> DomainResult<Option<Task>>;

    async fn list_tasks(&self, window: IdWindow) -> DomainResult<Vec<Task>>;

    /// Count tasks, optionally filtered to one state. An unrecognized
    /// `state` string is treated as "no filter", matching the original
    /// `UrlListLength` view's silent fallthrough.
    async fn count_tasks(&self, state: Option<TaskState>) -> DomainResult<u64>;

    /// `PUT /urls/{id}/`: record a result. Unconditionally sets
    /// `task_state = COMPLETE`, `end_time = now`, and clears both sides of
    /// the task<->agent binding, regardless of the task's prior state.
    async fn complete_task_with_result(
        &self,
        id: i64,
        result: Option<String>,
        now: u64,
    ) -> DomainResult<Task>;

    /// Transactional claim: select the QUEUED task with the lowest
    /// `fail_num` (ties broken by ascending id), and atomically bind it to
    /// `agent_id` (task.state=ASSIGNED, task.assigned_agent=agent,
    /// task.start_time=now; agent.state=ASSIGNED, agent.assigned_task=task).
    /// Returns `None` if no QUEUED task exists. Implementations must make
    /// the select-then-update indivisible so two concurrent callers never
    /// claim the same row (see §4.1, §5 assign lock).
    async fn claim_next_queued_task_for_agent(
        &self,
        agent_id: i64,
        now: u64,
    ) -> DomainResult<Option<Task>>;

    /// Roll back a claim whose `/start_run` call failed: task returns to
    /// QUEUED with no bound agent; agent returns to LOST with no bound
    /// task and `start_time` reset to 0.
    async fn rollback_assignment(&self, task_id: i64, agent_id: i64, now: u64) -> DomainResult<()>;

    /// Failed-task sweep: increment `fail_num`; if it reaches
    /// `max_task_retries`, the task becomes COMPLETE with no result
    /// (poison pill), else it returns to QUEUED with `start_time = 0`.
    /// Both sides of the task<->agent binding are cleared in the same
    /// transaction. No-ops (returns the task unchanged) if the task is no
    /// longer ASSIGNED to this agent.
    async fn sweep_failed_task(
        &self,
        task_id: i64,
        agent_id: i64,
        max_task_retries: u32,
    ) -> DomainResult<Option<Task>>;

    // ---- Agent ----------------------------------------------------------

    /// Create-or-return by `(hostname, agent_url)`. Returns the record and
    /// `true` if newly created, `false` if it already existed.
    async fn register_agent(&self, hostname: String, agent_url: String, now: u64) -> DomainResult<(Agent, bool)>;

    async fn get_agent(&self, id: i64) -> DomainResult<Option<Agent>>;

    async fn list_agents(&self, window: IdWindow) -> DomainResult<Vec<Agent>>;

    /// Overwrite an agent's reported state and bump `last_contact_attempt`.
    /// May be called by any component (§5): the agent's state has no
    /// single writer.
    async fn set_agent_state(&self, id: i64, state: AgentState, now: u64) -> DomainResult<Agent>;

    async fn touch_agent_contact(&self, id: i64, now: u64) -> DomainResult<()>;

    async fn bind_agent_runner(&self, id: i64, runner_id: i64) -> DomainResult<()>;

    // ---- Runner -----------------------------------------------------------

    async fn create_runner(&self, new_runner: NewRunner) -> DomainResult<Runner>;

    async fn get_runner(&self, id: i64) -> DomainResult<Option<Runner>>;

    // ---- ErrorLog -----------------------------------------------------------

    async fn create_error_log(
        &self,
        message: String,
        reporting_agent: Option<i64>,
        runner: Option<i64>,
        now: u64,
    ) -> DomainResult<ErrorLog>;

    async fn list_error_logs(&self) -> DomainResult<Vec<ErrorLog>>;

    // ---- Screenshot -----------------------------------------------------------

    async fn create_screenshot(
        &self,
        task: i64,
        file_name: String,
        bytes: Vec<u8>,
        now: u64,
    ) -> DomainResult<Screenshot>;

    async fn list_screenshots(&self, window: IdWindow) -> DomainResult<Vec<Screenshot>>;

    async fn get_screenshot(&self, id: i64) -> DomainResult<Option<Screenshot>>;

    async fn list_screenshots_for_task(&self, task_id: i64) -> DomainResult<Vec<Screenshot>>;

    // ---- Stats -----------------------------------------------------------

    async fn stats(&self) -> DomainResult<Stats>;
}
