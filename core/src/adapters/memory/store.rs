//! In-memory [`Store`] for unit and integration tests: no SQLite, no disk,
//! a single `tokio::sync::Mutex`-guarded set of maps standing in for
//! tables. Atomicity comes from holding the lock across each whole
//! operation, mirroring the transaction boundaries the SQLite store draws
//! with `pool.begin()`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::{Agent, AgentState, ErrorLog, Runner, Screenshot, Task, TaskState};
use crate::domain::ports::{IdWindow, NewRunner, NewTask, Stats, Store};

#[derive(Default)]
struct Tables {
    tasks: HashMap<i64, Task>,
    agents: HashMap<i64, Agent>,
    runners: HashMap<i64, Runner>,
    error_logs: HashMap<i64, ErrorLog>,
    screenshots: HashMap<i64, Screenshot>,
    next_task_id: i64,
    next_agent_id: i64,
    next_runner_id: i64,
    next_error_log_id: i64,
    next_screenshot_id: i64,
}

impl Tables {
    fn new() -> Self {
        Self {
            next_task_id: 1,
            next_agent_id: 1,
            next_runner_id: 1,
            next_error_log_id: 1,
            next_screenshot_id: 1,
            ..Default::default()
        }
    }
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { tables: Mutex::new(Tables::new()) }
    }
}

fn apply_window<T>(items: Vec<T>, window: IdWindow, id_of: impl Fn(&T) -> i64) -> Vec<T> {
    match (window.min_id, window.max_id) {
        (Some(min), Some(max)) => items.into_iter().filter(|i| { let id = id_of(i); id >= min && id <= max }).collect(),
        _ => items,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_tasks(&self, inputs: Vec<NewTask>) -> DomainResult<Vec<Task>> {
        let mut tables = self.tables.lock().await;
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            let id = tables.next_task_id;
            tables.next_task_id += 1;
            let task = Task::new_queued(id, input.url, input.json_metadata);
            tables.tasks.insert(id, task.clone());
            created.push(task);
        }
        Ok(created)
    }

    async fn get_task(&self, id: i64) -> DomainResult<Option<Task>> {
        Ok(self.tables.lock().await.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, window: IdWindow) -> DomainResult<Vec<Task>> {
        let mut items: Vec<Task> = self.tables.lock().await.tasks.values().cloned().collect();
        items.sort_by_key(|t| t.id);
        Ok(apply_window(items, window, |t| t.id))
    }

    async fn count_tasks(&self, state: Option<TaskState>) -> DomainResult<u64> {
        let tables = self.tables.lock().await;
        let count = match state {
            Some(s) => tables.tasks.values().filter(|t| t.task_state == s).count(),
            None => tables.tasks.len(),
        };
        Ok(count as u64)
    }

    async fn complete_task_with_result(&self, id: i64, result: Option<String>, now: u64) -> DomainResult<Task> {
        let mut tables = self.tables.lock().await;
        let existing = tables.tasks.get(&id).ok_or(DomainError::TaskNotFound(id))?;
        if existing.task_state == TaskState::Complete {
            return Err(DomainError::InvalidStateTransition {
                from: TaskState::Complete.as_str().to_string(),
                to: TaskState::Complete.as_str().to_string(),
            });
        }
        let agent_id = existing.assigned_agent;

        let task = tables.tasks.get_mut(&id).ok_or(DomainError::TaskNotFound(id))?;
        task.task_result = result;
        task.task_state = TaskState::Complete;
        task.end_time = Some(now);
        task.assigned_agent = None;
        let updated = task.clone();

        if let Some(agent_id) = agent_id {
            if let Some(agent) = tables.agents.get_mut(&agent_id) {
                if agent.assigned_task == Some(id) {
                    agent.assigned_task = None;
                }
            }
        }

        Ok(updated)
    }

    async fn claim_next_queued_task_for_agent(&self, agent_id: i64, now: u64) -> DomainResult<Option<Task>> {
        let mut tables = self.tables.lock().await;

        let candidate_id = tables
            .tasks
            .values()
            .filter(|t| t.task_state == TaskState::Queued)
            .min_by_key(|t| (t.fail_num, t.id))
            .map(|t| t.id);

        let Some(task_id) = candidate_id else { return Ok(None) };

        let task = tables.tasks.get_mut(&task_id).expect("candidate id came from this map");
        task.task_state = TaskState::Assigned;
        task.assigned_agent = Some(agent_id);
        task.start_time = now;
        let updated = task.clone();

        if let Some(agent) = tables.agents.get_mut(&agent_id) {
            agent.agent_state = AgentState::Assigned;
            agent.assigned_task = Some(task_id);
        }

        Ok(Some(updated))
    }

    async fn rollback_assignment(&self, task_id: i64, agent_id: i64, now: u64) -> DomainResult<()> {
        let mut tables = self.tables.lock().await;

        if let Some(task) = tables.tasks.get_mut(&task_id) {
            if task.assigned_agent == Some(agent_id) {
                task.task_state = TaskState::Queued;
                task.assigned_agent = None;
                task.start_time = 0;
            }
        }

        if let Some(agent) = tables.agents.get_mut(&agent_id) {
            agent.agent_state = AgentState::Lost;
            agent.assigned_task = None;
            agent.last_contact_attempt = now;
        }

        Ok(())
    }

    async fn sweep_failed_task(&self, task_id: i64, agent_id: i64, max_task_retries: u32) -> DomainResult<Option<Task>> {
        let mut tables = self.tables.lock().await;

        let eligible = matches!(
            tables.tasks.get(&task_id),
            Some(t) if t.assigned_agent == Some(agent_id) && t.task_state == TaskState::Assigned
        );
        if !eligible {
            return Ok(None);
        }

        let task = tables.tasks.get_mut(&task_id).expect("checked above");
        task.fail_num += 1;
        task.start_time = 0;
        task.task_state = if task.fail_num >= max_task_retries { TaskState::Complete } else { TaskState::Queued };
        task.assigned_agent = None;
        let updated = task.clone();

        if let Some(agent) = tables.agents.get_mut(&agent_id) {
            agent.assigned_task = None;
        }

        Ok(Some(updated))
    }

    async fn register_agent(&self, hostname: String, agent_url: String, now: u64) -> DomainResult<(Agent, bool)> {
        let mut tables = self.tables.lock().await;

        if let Some(existing) = tables.agents.values().find(|a| a.hostname == hostname && a.agent_url == agent_url) {
            return Ok((existing.clone(), false));
        }

        let id = tables.next_agent_id;
        tables.next_agent_id += 1;
        let agent = Agent::new(id, hostname, agent_url, now);
        tables.agents.insert(id, agent.clone());
        Ok((agent, true))
    }

    async fn get_agent(&self, id: i64) -> DomainResult<Option<Agent>> {
        Ok(self.tables.lock().await.agents.get(&id).cloned())
    }

    async fn list_agents(&self, window: IdWindow) -> DomainResult<Vec<Agent>> {
        let mut items: Vec<Agent> = self.tables.lock().await.agents.values().cloned().collect();
        items.sort_by_key(|a| a.id);
        Ok(apply_window(items, window, |a| a.id))
    }

    async fn set_agent_state(&self, id: i64, state: AgentState, now: u64) -> DomainResult<Agent> {
        let mut tables = self.tables.lock().await;
        let agent = tables.agents.get_mut(&id).ok_or(DomainError::AgentNotFound(id))?;
        agent.agent_state = state;
        agent.last_contact_attempt = now;
        Ok(agent.clone())
    }

    async fn touch_agent_contact(&self, id: i64, now: u64) -> DomainResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(agent) = tables.agents.get_mut(&id) {
            agent.last_contact_attempt = now;
        }
        Ok(())
    }

    async fn bind_agent_runner(&self, id: i64, runner_id: i64) -> DomainResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(agent) = tables.agents.get_mut(&id) {
            agent.assigned_runner = Some(runner_id);
        }
        Ok(())
    }

    async fn create_runner(&self, new_runner: NewRunner) -> DomainResult<Runner> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_runner_id;
        tables.next_runner_id += 1;
        let runner = Runner {
            id,
            contents: new_runner.contents,
            file_name: new_runner.file_name,
            file_type: new_runner.file_type,
            custom_executable: new_runner.custom_executable,
            dependency_file: new_runner.dependency_file,
        };
        tables.runners.insert(id, runner.clone());
        Ok(runner)
    }

    async fn get_runner(&self, id: i64) -> DomainResult<Option<Runner>> {
        Ok(self.tables.lock().await.runners.get(&id).cloned())
    }

    async fn create_error_log(
        &self,
        message: String,
        reporting_agent: Option<i64>,
        runner: Option<i64>,
        now: u64,
    ) -> DomainResult<ErrorLog> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_error_log_id;
        tables.next_error_log_id += 1;
        let log = ErrorLog::new(id, message, reporting_agent, runner, now);
        tables.error_logs.insert(id, log.clone());
        Ok(log)
    }

    async fn list_error_logs(&self) -> DomainResult<Vec<ErrorLog>> {
        let mut items: Vec<ErrorLog> = self.tables.lock().await.error_logs.values().cloned().collect();
        items.sort_by_key(|e| e.id);
        Ok(items)
    }

    async fn create_screenshot(&self, task: i64, file_name: String, bytes: Vec<u8>, now: u64) -> DomainResult<Screenshot> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_screenshot_id;
        tables.next_screenshot_id += 1;
        let shot = Screenshot { id, task, timestamp: now, file_name, bytes };
        tables.screenshots.insert(id, shot.clone());
        Ok(shot)
    }

    async fn list_screenshots(&self, window: IdWindow) -> DomainResult<Vec<Screenshot>> {
        let mut items: Vec<Screenshot> = self.tables.lock().await.screenshots.values().cloned().collect();
        items.sort_by_key(|s| s.id);
        Ok(apply_window(items, window, |s| s.id))
    }

    async fn get_screenshot(&self, id: i64) -> DomainResult<Option<Screenshot>> {
        Ok(self.tables.lock().await.screenshots.get(&id).cloned())
    }

    async fn list_screenshots_for_task(&self, task_id: i64) -> DomainResult<Vec<Screenshot>> {
        let mut items: Vec<Screenshot> =
            self.tables.lock().await.screenshots.values().filter(|s| s.task == task_id).cloned().collect();
        items.sort_by_key(|s| s.id);
        Ok(items)
    }

    async fn stats(&self) -> DomainResult<Stats> {
        let tables = self.tables.lock().await;
        Ok(Stats {
            urls: tables.tasks.len() as u64,
            urls_queued: tables.tasks.values().filter(|t| t.task_state == TaskState::Queued).count() as u64,
            urls_assigned: tables.tasks.values().filter(|t| t.task_state == TaskState::Assigned).count() as u64,
            urls_complete: tables.tasks.values().filter(|t| t.task_state == TaskState::Complete).count() as u64,
            urls_failed_min_once: tables.tasks.values().filter(|t| t.fail_num >= 1).count() as u64,
            errors_logged: tables.error_logs.len() as u64,
            registered_agents: tables.agents.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_picks_lowest_fail_num_then_lowest_id() {
        let store = MemoryStore::new();
        store
            .create_tasks(vec![
                NewTask { url: "http://a".into(), json_metadata: None },
                NewTask { url: "http://b".into(), json_metadata: None },
            ])
            .await
            .unwrap();
        // Bump task 1's fail_num above task 2's via a sweep roundtrip.
        let (agent, _) = store.register_agent("h".into(), "http://agent".into(), 0).await.unwrap();
        let first_claim = store.claim_next_queued_task_for_agent(agent.id, 1).await.unwrap().unwrap();
        assert_eq!(first_claim.id, 1);
        store.sweep_failed_task(first_claim.id, agent.id, 5).await.unwrap();

        let second_claim = store.claim_next_queued_task_for_agent(agent.id, 2).await.unwrap().unwrap();
        assert_eq!(second_claim.id, 2, "task 2 has fail_num 0, task 1 now has fail_num 1");
    }

    #[tokio::test]
    async fn claim_binds_both_sides_of_the_reference() {
        let store = MemoryStore::new();
        store.create_tasks(vec![NewTask { url: "http://a".into(), json_metadata: None }]).await.unwrap();
        let (agent, _) = store.register_agent("h".into(), "http://agent".into(), 0).await.unwrap();

        let task = store.claim_next_queued_task_for_agent(agent.id, 1).await.unwrap().unwrap();
        let agent_after = store.get_agent(agent.id).await.unwrap().unwrap();

        assert_eq!(agent_after.assigned_task, Some(task.id));
        assert_eq!(task.assigned_agent, Some(agent.id));
        assert_eq!(agent_after.agent_state, AgentState::Assigned);
    }

    #[tokio::test]
    async fn reconnect_returns_existing_record() {
        let store = MemoryStore::new();
        let (a, created_a) = store.register_agent("h".into(), "http://x".into(), 1).await.unwrap();
        assert!(created_a);
        let (b, created_b) = store.register_agent("h".into(), "http://x".into(), 2).await.unwrap();
        assert!(!created_b);
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn completing_an_already_complete_task_is_rejected() {
        let store = MemoryStore::new();
        store.create_tasks(vec![NewTask { url: "http://a".into(), json_metadata: None }]).await.unwrap();
        let (agent, _) = store.register_agent("h".into(), "http://agent".into(), 0).await.unwrap();
        let task = store.claim_next_queued_task_for_agent(agent.id, 1).await.unwrap().unwrap();

        store.complete_task_with_result(task.id, Some("ok".into()), 2).await.unwrap();

        let err = store.complete_task_with_result(task.id, Some("again".into()), 3).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }
}
