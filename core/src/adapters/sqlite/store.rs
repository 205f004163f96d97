//! SQLite implementation of [`Store`], backing the production master.
//!
//! Every multi-statement mutation is wrapped in an explicit `pool.begin()`
//! transaction; there is no implicit-transaction ORM layer to lean on.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::{Agent, AgentState, ErrorLog, Runner, RunnerType, Screenshot, Task, TaskState};
use crate::domain::ports::{IdWindow, NewRunner, NewTask, Stats, Store};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> DomainResult<Task> {
    let state_str: String = row.try_get("task_state")?;
    let task_state = TaskState::parse_str(&state_str)
        .ok_or_else(|| DomainError::DatabaseError(format!("unknown task_state {state_str}")))?;
    Ok(Task {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        json_metadata: row.try_get("json_metadata")?,
        task_result: row.try_get("task_result")?,
        task_state,
        assigned_agent: row.try_get("assigned_agent")?,
        fail_num: row.try_get::<i64, _>("fail_num")? as u32,
        start_time: row.try_get::<i64, _>("start_time")? as u64,
        end_time: row.try_get::<Option<i64>, _>("end_time")?.map(|v| v as u64),
    })
}

fn row_to_agent(row: &sqlx::sqlite::SqliteRow) -> DomainResult<Agent> {
    let state_str: String = row.try_get("agent_state")?;
    let agent_state = AgentState::parse_str(&state_str)
        .ok_or_else(|| DomainError::DatabaseError(format!("unknown agent_state {state_str}")))?;
    Ok(Agent {
        id: row.try_get("id")?,
        hostname: row.try_get("hostname")?,
        agent_state,
        last_contact_attempt: row.try_get::<i64, _>("last_contact_attempt")? as u64,
        agent_url: row.try_get("agent_url")?,
        assigned_task: row.try_get("assigned_task")?,
        assigned_runner: row.try_get("assigned_runner")?,
    })
}

fn row_to_runner(row: &sqlx::sqlite::SqliteRow) -> DomainResult<Runner> {
    let type_str: String = row.try_get("file_type")?;
    let file_type = RunnerType::parse_str(&type_str)
        .ok_or_else(|| DomainError::DatabaseError(format!("unknown runner file_type {type_str}")))?;
    Ok(Runner {
        id: row.try_get("id")?,
        contents: row.try_get("contents")?,
        file_name: row.try_get("file_name")?,
        file_type,
        custom_executable: row.try_get("custom_executable")?,
        dependency_file: row.try_get("dependency_file")?,
    })
}

fn row_to_error_log(row: &sqlx::sqlite::SqliteRow) -> DomainResult<ErrorLog> {
    Ok(ErrorLog {
        id: row.try_get("id")?,
        message: row.try_get("message")?,
        reporting_agent: row.try_get("reporting_agent")?,
        runner: row.try_get("runner")?,
        timestamp: row.try_get::<i64, _>("timestamp")? as u64,
    })
}

fn row_to_screenshot(row: &sqlx::sqlite::SqliteRow, with_bytes: bool) -> DomainResult<Screenshot> {
    Ok(Screenshot {
        id: row.try_get("id")?,
        task: row.try_get("task")?,
        timestamp: row.try_get::<i64, _>("timestamp")? as u64,
        file_name: row.try_get("file_name")?,
        bytes: if with_bytes { row.try_get("bytes")? } else { Vec::new() },
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_tasks(&self, inputs: Vec<NewTask>) -> DomainResult<Vec<Task>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            let id: i64 = sqlx::query(
                "INSERT INTO tasks (url, json_metadata, task_state, fail_num, start_time) \
                 VALUES (?, ?, 'QUEUED', 0, 0) RETURNING id",
            )
            .bind(&input.url)
            .bind(&input.json_metadata)
            .fetch_one(&mut *tx)
            .await?
            .try_get("id")?;

            created.push(Task::new_queued(id, input.url, input.json_metadata));
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn get_task(&self, id: i64) -> DomainResult<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_task).transpose()
    }

    async fn list_tasks(&self, window: IdWindow) -> DomainResult<Vec<Task>> {
        let rows = match (window.min_id, window.max_id) {
            (Some(min), Some(max)) => {
                sqlx::query("SELECT * FROM tasks WHERE id >= ? AND id <= ? ORDER BY id")
                    .bind(min)
                    .bind(max)
                    .fetch_all(&self.pool)
                    .await?
            }
            _ => sqlx::query("SELECT * FROM tasks ORDER BY id").fetch_all(&self.pool).await?,
        };
        rows.iter().map(row_to_task).collect()
    }

    async fn count_tasks(&self, state: Option<TaskState>) -> DomainResult<u64> {
        let count: i64 = match state {
            Some(s) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE task_state = ?")
                    .bind(s.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => sqlx::query_scalar("SELECT COUNT(*) FROM tasks").fetch_one(&self.pool).await?,
        };
        Ok(count as u64)
    }

    async fn complete_task_with_result(&self, id: i64, result: Option<String>, now: u64) -> DomainResult<Task> {
        let mut tx = self.pool.begin().await?;

        let (task_state, agent_id): (String, Option<i64>) =
            sqlx::query_as("SELECT task_state, assigned_agent FROM tasks WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(DomainError::TaskNotFound(id))?;

        if task_state == TaskState::Complete.as_str() {
            return Err(DomainError::InvalidStateTransition {
                from: TaskState::Complete.as_str().to_string(),
                to: TaskState::Complete.as_str().to_string(),
            });
        }

        sqlx::query(
            "UPDATE tasks SET task_result = ?, task_state = 'COMPLETE', end_time = ?, assigned_agent = NULL WHERE id = ?",
        )
        .bind(&result)
        .bind(now as i64)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(agent_id) = agent_id {
            sqlx::query("UPDATE agents SET assigned_task = NULL WHERE id = ? AND assigned_task = ?")
                .bind(agent_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?").bind(id).fetch_one(&mut *tx).await?;
        let task = row_to_task(&row)?;
        tx.commit().await?;
        Ok(task)
    }

    async fn claim_next_queued_task_for_agent(&self, agent_id: i64, now: u64) -> DomainResult<Option<Task>> {
        let mut tx = self.pool.begin().await?;

        let candidate: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM tasks WHERE task_state = 'QUEUED' ORDER BY fail_num ASC, id ASC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(task_id) = candidate else {
            tx.rollback().await?;
            return Ok(None);
        };

        let result = sqlx::query(
            "UPDATE tasks SET task_state = 'ASSIGNED', assigned_agent = ?, start_time = ? \
             WHERE id = ? AND task_state = 'QUEUED'",
        )
        .bind(agent_id)
        .bind(now as i64)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Lost the race against a concurrent claim; caller retries next cycle.
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query("UPDATE agents SET agent_state = 'ASSIGNED', assigned_task = ? WHERE id = ?")
            .bind(task_id)
            .bind(agent_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?").bind(task_id).fetch_one(&mut *tx).await?;
        let task = row_to_task(&row)?;
        tx.commit().await?;
        Ok(Some(task))
    }

    async fn rollback_assignment(&self, task_id: i64, agent_id: i64, now: u64) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE tasks SET task_state = 'QUEUED', assigned_agent = NULL, start_time = 0 \
             WHERE id = ? AND assigned_agent = ?",
        )
        .bind(task_id)
        .bind(agent_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE agents SET agent_state = 'LOST', assigned_task = NULL, last_contact_attempt = ? WHERE id = ?",
        )
        .bind(now as i64)
        .bind(agent_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn sweep_failed_task(&self, task_id: i64, agent_id: i64, max_task_retries: u32) -> DomainResult<Option<Task>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM tasks WHERE id = ? AND assigned_agent = ? AND task_state = 'ASSIGNED'")
            .bind(task_id)
            .bind(agent_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let task = row_to_task(&row)?;
        let new_fail_num = task.fail_num + 1;
        let new_state = if new_fail_num >= max_task_retries { TaskState::Complete } else { TaskState::Queued };

        sqlx::query(
            "UPDATE tasks SET fail_num = ?, start_time = 0, task_state = ?, assigned_agent = NULL WHERE id = ?",
        )
        .bind(new_fail_num as i64)
        .bind(new_state.as_str())
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE agents SET assigned_task = NULL WHERE id = ?")
            .bind(agent_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?").bind(task_id).fetch_one(&mut *tx).await?;
        let task = row_to_task(&row)?;
        tx.commit().await?;
        Ok(Some(task))
    }

    async fn register_agent(&self, hostname: String, agent_url: String, now: u64) -> DomainResult<(Agent, bool)> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT * FROM agents WHERE hostname = ? AND agent_url = ?")
            .bind(&hostname)
            .bind(&agent_url)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(row) = existing {
            let agent = row_to_agent(&row)?;
            tx.commit().await?;
            return Ok((agent, false));
        }

        let id: i64 = sqlx::query(
            "INSERT INTO agents (hostname, agent_url, agent_state, last_contact_attempt) \
             VALUES (?, ?, 'NO_RUNNER', ?) RETURNING id",
        )
        .bind(&hostname)
        .bind(&agent_url)
        .bind(now as i64)
        .fetch_one(&mut *tx)
        .await?
        .try_get("id")?;

        tx.commit().await?;
        Ok((Agent::new(id, hostname, agent_url, now), true))
    }

    async fn get_agent(&self, id: i64) -> DomainResult<Option<Agent>> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = ?").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_agent).transpose()
    }

    async fn list_agents(&self, window: IdWindow) -> DomainResult<Vec<Agent>> {
        let rows = match (window.min_id, window.max_id) {
            (Some(min), Some(max)) => {
                sqlx::query("SELECT * FROM agents WHERE id >= ? AND id <= ? ORDER BY id")
                    .bind(min)
                    .bind(max)
                    .fetch_all(&self.pool)
                    .await?
            }
            _ => sqlx::query("SELECT * FROM agents ORDER BY id").fetch_all(&self.pool).await?,
        };
        rows.iter().map(row_to_agent).collect()
    }

    async fn set_agent_state(&self, id: i64, state: AgentState, now: u64) -> DomainResult<Agent> {
        sqlx::query("UPDATE agents SET agent_state = ?, last_contact_attempt = ? WHERE id = ?")
            .bind(state.as_str())
            .bind(now as i64)
            .bind(id)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DomainError::AgentNotFound(id))?;
        row_to_agent(&row)
    }

    async fn touch_agent_contact(&self, id: i64, now: u64) -> DomainResult<()> {
        sqlx::query("UPDATE agents SET last_contact_attempt = ? WHERE id = ?")
            .bind(now as i64)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn bind_agent_runner(&self, id: i64, runner_id: i64) -> DomainResult<()> {
        sqlx::query("UPDATE agents SET assigned_runner = ? WHERE id = ?")
            .bind(runner_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_runner(&self, new_runner: NewRunner) -> DomainResult<Runner> {
        let id: i64 = sqlx::query(
            "INSERT INTO runners (contents, file_name, file_type, custom_executable, dependency_file) \
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&new_runner.contents)
        .bind(&new_runner.file_name)
        .bind(new_runner.file_type.as_str())
        .bind(&new_runner.custom_executable)
        .bind(&new_runner.dependency_file)
        .fetch_one(&self.pool)
        .await?
        .try_get("id")?;

        Ok(Runner {
            id,
            contents: new_runner.contents,
            file_name: new_runner.file_name,
            file_type: new_runner.file_type,
            custom_executable: new_runner.custom_executable,
            dependency_file: new_runner.dependency_file,
        })
    }

    async fn get_runner(&self, id: i64) -> DomainResult<Option<Runner>> {
        let row = sqlx::query("SELECT * FROM runners WHERE id = ?").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_runner).transpose()
    }

    async fn create_error_log(
        &self,
        message: String,
        reporting_agent: Option<i64>,
        runner: Option<i64>,
        now: u64,
    ) -> DomainResult<ErrorLog> {
        let id: i64 = sqlx::query(
            "INSERT INTO error_logs (message, reporting_agent, runner, timestamp) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&message)
        .bind(reporting_agent)
        .bind(runner)
        .bind(now as i64)
        .fetch_one(&self.pool)
        .await?
        .try_get("id")?;

        Ok(ErrorLog::new(id, message, reporting_agent, runner, now))
    }

    async fn list_error_logs(&self) -> DomainResult<Vec<ErrorLog>> {
        let rows = sqlx::query("SELECT * FROM error_logs ORDER BY id").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_error_log).collect()
    }

    async fn create_screenshot(&self, task: i64, file_name: String, bytes: Vec<u8>, now: u64) -> DomainResult<Screenshot> {
        let id: i64 = sqlx::query(
            "INSERT INTO screenshots (task, file_name, timestamp, bytes) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(task)
        .bind(&file_name)
        .bind(now as i64)
        .bind(&bytes)
        .fetch_one(&self.pool)
        .await?
        .try_get("id")?;

        Ok(Screenshot { id, task, timestamp: now, file_name, bytes })
    }

    async fn list_screenshots(&self, window: IdWindow) -> DomainResult<Vec<Screenshot>> {
        let rows = match (window.min_id, window.max_id) {
            (Some(min), Some(max)) => {
                sqlx::query("SELECT id, task, file_name, timestamp FROM screenshots WHERE id >= ? AND id <= ? ORDER BY id")
                    .bind(min)
                    .bind(max)
                    .fetch_all(&self.pool)
                    .await?
            }
            _ => sqlx::query("SELECT id, task, file_name, timestamp FROM screenshots ORDER BY id").fetch_all(&self.pool).await?,
        };
        rows.iter().map(|r| row_to_screenshot(r, false)).collect()
    }

    async fn get_screenshot(&self, id: i64) -> DomainResult<Option<Screenshot>> {
        let row = sqlx::query("SELECT * FROM screenshots WHERE id = ?").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(|r| row_to_screenshot(r, true)).transpose()
    }

    async fn list_screenshots_for_task(&self, task_id: i64) -> DomainResult<Vec<Screenshot>> {
        let rows = sqlx::query("SELECT id, task, file_name, timestamp FROM screenshots WHERE task = ? ORDER BY id")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| row_to_screenshot(r, false)).collect()
    }

    async fn stats(&self) -> DomainResult<Stats> {
        let urls: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks").fetch_one(&self.pool).await?;
        let urls_queued: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE task_state = 'QUEUED'").fetch_one(&self.pool).await?;
        let urls_assigned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE task_state = 'ASSIGNED'").fetch_one(&self.pool).await?;
        let urls_complete: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE task_state = 'COMPLETE'").fetch_one(&self.pool).await?;
        let urls_failed_min_once: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE fail_num >= 1").fetch_one(&self.pool).await?;
        let errors_logged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM error_logs").fetch_one(&self.pool).await?;
        let registered_agents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agents").fetch_one(&self.pool).await?;

        Ok(Stats {
            urls: urls as u64,
            urls_queued: urls_queued as u64,
            urls_assigned: urls_assigned as u64,
            urls_complete: urls_complete as u64,
            urls_failed_min_once: urls_failed_min_once as u64,
            errors_logged: errors_logged as u64,
            registered_agents: registered_agents as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_test_pool;
    use crate::adapters::sqlite::migrations::Migrator;

    async fn test_store() -> SqliteStore {
        let pool = create_test_pool().await.unwrap();
        Migrator::new(pool.clone()).run().await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn create_and_claim_orders_by_fail_num_then_id() {
        let store = test_store().await;
        store
            .create_tasks(vec![
                NewTask { url: "http://a".into(), json_metadata: None },
                NewTask { url: "http://b".into(), json_metadata: None },
            ])
            .await
            .unwrap();

        let (agent, created) = store.register_agent("h".into(), "http://agent".into(), 100).await.unwrap();
        assert!(created);

        let claimed = store.claim_next_queued_task_for_agent(agent.id, 200).await.unwrap().unwrap();
        assert_eq!(claimed.url, "http://a");
        assert_eq!(claimed.task_state, TaskState::Assigned);
        assert_eq!(claimed.assigned_agent, Some(agent.id));

        let agent_after = store.get_agent(agent.id).await.unwrap().unwrap();
        assert_eq!(agent_after.assigned_task, Some(claimed.id));
        assert_eq!(agent_after.agent_state, AgentState::Assigned);
    }

    #[tokio::test]
    async fn register_agent_twice_returns_same_id() {
        let store = test_store().await;
        let (first, created_first) = store.register_agent("h".into(), "http://a".into(), 1).await.unwrap();
        assert!(created_first);
        let (second, created_second) = store.register_agent("h".into(), "http://a".into(), 2).await.unwrap();
        assert!(!created_second);
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_agents(IdWindow::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn complete_task_with_result_clears_binding() {
        let store = test_store().await;
        store.create_tasks(vec![NewTask { url: "http://a".into(), json_metadata: None }]).await.unwrap();
        let (agent, _) = store.register_agent("h".into(), "http://a".into(), 1).await.unwrap();
        let task = store.claim_next_queued_task_for_agent(agent.id, 2).await.unwrap().unwrap();

        let completed = store.complete_task_with_result(task.id, Some("{\"x\":1}".into()), 3).await.unwrap();
        assert_eq!(completed.task_state, TaskState::Complete);
        assert!(completed.assigned_agent.is_none());

        let agent_after = store.get_agent(agent.id).await.unwrap().unwrap();
        assert!(agent_after.assigned_task.is_none());

        let err = store.complete_task_with_result(task.id, None, 4).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn sweep_exhausts_retries_into_complete() {
        let store = test_store().await;
        store.create_tasks(vec![NewTask { url: "http://a".into(), json_metadata: None }]).await.unwrap();
        let (agent, _) = store.register_agent("h".into(), "http://a".into(), 1).await.unwrap();

        let task = store.claim_next_queued_task_for_agent(agent.id, 2).await.unwrap().unwrap();
        let swept = store.sweep_failed_task(task.id, agent.id, 1).await.unwrap().unwrap();
        assert_eq!(swept.task_state, TaskState::Complete);
        assert_eq!(swept.fail_num, 1);
        assert!(swept.task_result.is_none());
    }

    #[tokio::test]
    async fn sweep_under_ceiling_requeues() {
        let store = test_store().await;
        store.create_tasks(vec![NewTask { url: "http://a".into(), json_metadata: None }]).await.unwrap();
        let (agent, _) = store.register_agent("h".into(), "http://a".into(), 1).await.unwrap();

        let task = store.claim_next_queued_task_for_agent(agent.id, 2).await.unwrap().unwrap();
        let swept = store.sweep_failed_task(task.id, agent.id, 3).await.unwrap().unwrap();
        assert_eq!(swept.task_state, TaskState::Queued);
        assert_eq!(swept.start_time, 0);
        assert!(swept.assigned_agent.is_none());
    }
}
