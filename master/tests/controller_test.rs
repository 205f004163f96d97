//! Exercises task assignment, rollback, and the failed-task sweep against
//! a stubbed agent HTTP server, covering S1 (happy path assignment), S4
//! (retry exhaustion), and the rollback path in SPEC_FULL.md §4.3/§8.

use std::sync::Arc;

use dispatch_core::adapters::memory::MemoryStore;
use dispatch_core::{AgentState, NewTask, TaskState};
use dispatch_master::config::MasterConfig;
use dispatch_master::controller::{agent_client, assignment};
use dispatch_master::state::AppState;

fn test_state() -> AppState {
    AppState::new(Arc::new(MemoryStore::new()), MasterConfig::default())
}

/// S1 — assigning a task claims it, binds both sides, and successfully
/// calls `/start_run` on the agent.
#[tokio::test]
async fn assign_task_claims_and_starts_run_on_success() {
    let state = test_state();
    state.store.create_tasks(vec![NewTask { url: "http://0".into(), json_metadata: None }]).await.unwrap();
    let (agent, _) = state.store.register_agent("h".into(), "http://agent".into(), 1).await.unwrap();

    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", "/start_run").with_status(200).with_body("{}").create_async().await;

    assignment::assign_task(&state, agent.id, &server.url()).await;

    mock.assert_async().await;

    let task = state.store.get_task(1).await.unwrap().unwrap();
    assert_eq!(task.task_state, TaskState::Assigned);
    assert_eq!(task.assigned_agent, Some(agent.id));

    let agent_after = state.store.get_agent(agent.id).await.unwrap().unwrap();
    assert_eq!(agent_after.assigned_task, Some(task.id));
    assert_eq!(agent_after.agent_state, AgentState::Assigned);
}

/// A non-2xx `/start_run` response rolls the claim back: the task returns
/// to QUEUED unbound, and the agent is marked LOST.
#[tokio::test]
async fn assign_task_rolls_back_on_start_run_failure() {
    let state = test_state();
    state.store.create_tasks(vec![NewTask { url: "http://0".into(), json_metadata: None }]).await.unwrap();
    let (agent, _) = state.store.register_agent("h".into(), "http://agent".into(), 1).await.unwrap();

    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("POST", "/start_run").with_status(500).create_async().await;

    assignment::assign_task(&state, agent.id, &server.url()).await;

    let task = state.store.get_task(1).await.unwrap().unwrap();
    assert_eq!(task.task_state, TaskState::Queued);
    assert!(task.assigned_agent.is_none());

    let agent_after = state.store.get_agent(agent.id).await.unwrap().unwrap();
    assert_eq!(agent_after.agent_state, AgentState::Lost);
    assert!(agent_after.assigned_task.is_none());
}

/// A `/start_run` call to an address nothing is listening on rolls back
/// the same way a non-2xx response does.
#[tokio::test]
async fn assign_task_rolls_back_on_unreachable_agent() {
    let state = test_state();
    state.store.create_tasks(vec![NewTask { url: "http://0".into(), json_metadata: None }]).await.unwrap();
    let (agent, _) = state.store.register_agent("h".into(), "http://agent".into(), 1).await.unwrap();

    assignment::assign_task(&state, agent.id, "http://127.0.0.1:1").await;

    let task = state.store.get_task(1).await.unwrap().unwrap();
    assert_eq!(task.task_state, TaskState::Queued);
    let agent_after = state.store.get_agent(agent.id).await.unwrap().unwrap();
    assert_eq!(agent_after.agent_state, AgentState::Lost);
}

/// S4 — exhausting the retry ceiling converts the task to COMPLETE with
/// an empty result rather than re-queuing it forever.
#[tokio::test]
async fn sweep_exhausts_retries_into_complete_without_a_result() {
    let state = test_state();
    state.store.create_tasks(vec![NewTask { url: "http://0".into(), json_metadata: None }]).await.unwrap();
    let (agent, _) = state.store.register_agent("h".into(), "http://agent".into(), 1).await.unwrap();

    state.store.claim_next_queued_task_for_agent(agent.id, 1).await.unwrap().unwrap();
    assignment::sweep_failed_task(&state, agent.id, 1, 2).await;
    let task = state.store.get_task(1).await.unwrap().unwrap();
    assert_eq!(task.task_state, TaskState::Queued, "first failure still has retry budget");

    state.store.claim_next_queued_task_for_agent(agent.id, 2).await.unwrap().unwrap();
    assignment::sweep_failed_task(&state, agent.id, 1, 2).await;
    let task = state.store.get_task(1).await.unwrap().unwrap();
    assert_eq!(task.task_state, TaskState::Complete);
    assert!(task.task_result.is_none());
    assert!(task.assigned_agent.is_none());

    let stats = state.store.stats().await.unwrap();
    assert!(stats.urls_failed_min_once >= 1);
}

#[tokio::test]
async fn check_runner_parses_each_reported_status() {
    let mut server = mockito::Server::new_async().await;
    let client = reqwest::Client::new();

    for (status, expected) in [("IDLE", agent_client::RunnerStatus::Idle), ("RUNNING", agent_client::RunnerStatus::Running), ("NO_RUNNER", agent_client::RunnerStatus::NoRunner)]
    {
        let mock = server
            .mock("POST", "/check_runner")
            .with_status(200)
            .with_body(format!(r#"{{"status": "{status}"}}"#))
            .create_async()
            .await;
        let result = agent_client::check_runner(&client, &server.url(), None).await.unwrap();
        assert_eq!(result, Some(expected));
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn check_runner_is_err_when_agent_unreachable() {
    let client = reqwest::Client::new();
    let result = agent_client::check_runner(&client, "http://127.0.0.1:1", None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn kill_run_is_best_effort_and_ignores_response_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("POST", "/kill_run").with_status(500).create_async().await;
    let client = reqwest::Client::new();
    agent_client::kill_run(&client, &server.url(), None).await.unwrap();
}
