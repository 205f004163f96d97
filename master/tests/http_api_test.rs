//! End-to-end exercises of the master's HTTP surface against an in-memory
//! Store, covering the scenarios and round-trip laws in SPEC_FULL.md §8.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dispatch_core::adapters::memory::MemoryStore;
use dispatch_master::config::MasterConfig;
use dispatch_master::http;
use dispatch_master::state::AppState;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_state(token: Option<&str>) -> AppState {
    let mut config = MasterConfig::default();
    config.pymada_token_auth = token.map(str::to_string);
    AppState::new(Arc::new(MemoryStore::new()), config)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// S2 — registering the same (hostname, url) pair twice returns the
/// original record and does not grow the agent count.
#[tokio::test]
async fn reconnect_returns_existing_agent_and_201_then_200() {
    let state = test_state(None);
    let app = http::router(state);

    let req = json_request("POST", "/register_agent/", json!({"hostname": "h", "agent_url": "http://a", "runner_num": 1}));
    let first = app.clone().oneshot(req).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_body = body_json(first).await;

    let req = json_request("POST", "/register_agent/", json!({"hostname": "h", "agent_url": "http://a", "runner_num": 1}));
    let second = app.clone().oneshot(req).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = body_json(second).await;

    assert_eq!(first_body["id"], second_body["id"]);

    let list_resp = app.oneshot(Request::builder().uri("/agents/").body(Body::empty()).unwrap()).await.unwrap();
    let agents = body_json(list_resp).await;
    assert_eq!(agents.as_array().unwrap().len(), 1);
}

/// S3 — bulk-creating tasks returns one record per input, in order,
/// carrying through the optional metadata.
#[tokio::test]
async fn bulk_create_tasks_returns_one_record_per_input() {
    let state = test_state(None);
    let app = http::router(state);

    let req = json_request(
        "POST",
        "/urls/",
        json!([
            {"url": "http://t1"},
            {"url": "http://t2"},
            {"url": "http://t3", "json_metadata": "{\"k\":\"v\"}"},
        ]),
    );
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    let created = created.as_array().unwrap();
    assert_eq!(created.len(), 3);
    assert_eq!(created[2]["json_metadata"], "{\"k\":\"v\"}");
    assert_eq!(created[0]["task_state"], "QUEUED");

    let get_resp = app.oneshot(Request::builder().uri("/urls/").body(Body::empty()).unwrap()).await.unwrap();
    let listed = body_json(get_resp).await;
    assert_eq!(listed.as_array().unwrap().len(), 3);
}

/// Round-trip law: a task POSTed then fetched carries the same url and
/// metadata; uploading a result via PUT sets COMPLETE unconditionally.
#[tokio::test]
async fn result_put_completes_task_and_clears_agent_binding() {
    let state = test_state(None);

    // Seed an agent bound to the task the way the controller would,
    // bypassing HTTP since assignment has no public endpoint.
    let (agent, _) = state.store.register_agent("h".into(), "http://a".into(), 1).await.unwrap();
    state.store.create_tasks(vec![dispatch_core::NewTask { url: "http://0".into(), json_metadata: None }]).await.unwrap();
    let claimed = state.store.claim_next_queued_task_for_agent(agent.id, 2).await.unwrap().unwrap();

    let app = http::router(state.clone());
    let req = json_request("PUT", &format!("/urls/{}/", claimed.id), json!({"task_result": "{\"x\": 1}"}));
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["task_state"], "COMPLETE");
    assert_eq!(body["task_result"], "{\"x\": 1}");
    assert!(body["assigned_agent"].is_null());

    let agent_after = state.store.get_agent(agent.id).await.unwrap().unwrap();
    assert!(agent_after.assigned_task.is_none());
}

#[tokio::test]
async fn result_put_on_already_complete_task_returns_409() {
    let state = test_state(None);
    let (agent, _) = state.store.register_agent("h".into(), "http://a".into(), 1).await.unwrap();
    state.store.create_tasks(vec![dispatch_core::NewTask { url: "http://0".into(), json_metadata: None }]).await.unwrap();
    let claimed = state.store.claim_next_queued_task_for_agent(agent.id, 2).await.unwrap().unwrap();

    let app = http::router(state.clone());
    let first = json_request("PUT", &format!("/urls/{}/", claimed.id), json!({"task_result": "{\"x\": 1}"}));
    assert_eq!(app.clone().oneshot(first).await.unwrap().status(), StatusCode::OK);

    let second = json_request("PUT", &format!("/urls/{}/", claimed.id), json!({"task_result": "{\"x\": 2}"}));
    let resp = app.oneshot(second).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn count_tasks_filters_by_state_and_ignores_unknown_filter() {
    let state = test_state(None);
    state
        .store
        .create_tasks(vec![
            dispatch_core::NewTask { url: "http://a".into(), json_metadata: None },
            dispatch_core::NewTask { url: "http://b".into(), json_metadata: None },
        ])
        .await
        .unwrap();

    let app = http::router(state);
    let resp = app.clone().oneshot(Request::builder().uri("/url_tasks_length/?state=QUEUED").body(Body::empty()).unwrap()).await.unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["url_tasks"], 2);

    let resp = app.oneshot(Request::builder().uri("/url_tasks_length/?state=bogus").body(Body::empty()).unwrap()).await.unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["url_tasks"], 2, "unrecognized state string is treated as no filter");
}

#[tokio::test]
async fn screenshot_round_trips_bytes_and_mime_by_extension() {
    let state = test_state(None);
    state.store.create_tasks(vec![dispatch_core::NewTask { url: "http://0".into(), json_metadata: None }]).await.unwrap();

    let app = http::router(state);

    let boundary = "x-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"task\"\r\n\r\n1\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"screenshot\"; filename=\"shot.png\"\r\n\
         Content-Type: image/png\r\n\r\n\x89PNG-bytes\r\n--{boundary}--\r\n"
    );
    let req = Request::builder()
        .method("POST")
        .uri("/screenshots/")
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    let id = created["id"].as_i64().unwrap();

    let get_resp = app.oneshot(Request::builder().uri(format!("/screenshots/{id}/")).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(get_resp.status(), StatusCode::OK);
    assert_eq!(get_resp.headers().get("content-type").unwrap(), "image/png");
    let bytes = get_resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"\x89PNG-bytes");
}

#[tokio::test]
async fn task_screenshots_404s_when_none_uploaded() {
    let state = test_state(None);
    state.store.create_tasks(vec![dispatch_core::NewTask { url: "http://0".into(), json_metadata: None }]).await.unwrap();

    let app = http::router(state);
    let resp = app.oneshot(Request::builder().uri("/task_screenshots/1/").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_reports_aggregate_counters() {
    let state = test_state(None);
    state.store.create_tasks(vec![dispatch_core::NewTask { url: "http://0".into(), json_metadata: None }]).await.unwrap();
    state.store.register_agent("h".into(), "http://a".into(), 1).await.unwrap();

    let app = http::router(state);
    let resp = app.oneshot(Request::builder().uri("/stats/").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["urls"], 1);
    assert_eq!(body["urls_queued"], 1);
    assert_eq!(body["registered_agents"], 1);
}

#[tokio::test]
async fn auth_rejects_requests_missing_token_when_configured() {
    let state = test_state(Some("secret"));
    let app = http::router(state);

    let resp = app.clone().oneshot(Request::builder().uri("/agents/").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .oneshot(Request::builder().uri("/agents/").header("pymada_token_auth", "secret").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_accepts_everything_when_unconfigured() {
    let state = test_state(None);
    let app = http::router(state);

    let resp = app.oneshot(Request::builder().uri("/agents/").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
