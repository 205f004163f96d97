//! Facade a user-supplied runner script links against (§4.5). Every
//! operation is a single blocking call to the agent running on the same
//! host — no retry, no state; the agent layer is what handles durability
//! and the retrying master conversation.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to local agent failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to read screenshot file: {0}")]
    Io(#[from] std::io::Error),
}

/// Talks only to the local agent, never to the master directly.
pub struct Client {
    host: String,
    http: reqwest::blocking::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Client {
    /// `host_url` overrides the default. Absent that, `AGENT_PORT` picks
    /// the port on `localhost`; absent both, `http://localhost:5001`.
    pub fn new(host_url: Option<String>) -> Self {
        let host = host_url.unwrap_or_else(|| match std::env::var("AGENT_PORT") {
            Ok(port) => format!("http://localhost:{port}"),
            Err(_) => "http://localhost:5001".to_string(),
        });

        Self { host, http: reqwest::blocking::Client::new() }
    }

    pub fn get_task(&self) -> Result<Value, ClientError> {
        let url = format!("{}/get_task", self.host);
        Ok(self.http.post(url).send()?.json()?)
    }

    pub fn save_result<T: Serialize>(&self, result: &T) -> Result<Value, ClientError> {
        let url = format!("{}/save_results", self.host);
        Ok(self.http.post(url).json(result).send()?.json()?)
    }

    pub fn add_url(&self, url: &str, json_metadata: Option<&str>) -> Result<Value, ClientError> {
        let req_url = format!("{}/add_url", self.host);
        let body = serde_json::json!({ "url": url, "json_metadata": json_metadata });
        Ok(self.http.post(req_url).json(&body).send()?.json()?)
    }

    pub fn log_error(&self, message: &str) -> Result<Value, ClientError> {
        let req_url = format!("{}/log_error", self.host);
        let body = serde_json::json!({ "message": message });
        Ok(self.http.post(req_url).json(&body).send()?.json()?)
    }

    pub fn save_screenshot(&self, screenshot_path: &Path) -> Result<Value, ClientError> {
        let bytes = std::fs::read(screenshot_path)?;
        let file_name = screenshot_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

        let part = reqwest::blocking::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::blocking::multipart::Form::new().part("screenshot", part);

        let req_url = format!("{}/save_screenshot", self.host);
        Ok(self.http.post(req_url).multipart(form).send()?.json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_localhost_5001_without_override() {
        temp_env::with_var_unset("AGENT_PORT", || {
            let client = Client::new(None);
            assert_eq!(client.host, "http://localhost:5001");
        });
    }

    #[test]
    fn honors_explicit_host_override() {
        let client = Client::new(Some("http://127.0.0.1:9999".to_string()));
        assert_eq!(client.host, "http://127.0.0.1:9999");
    }

    #[test]
    fn get_task_round_trips_through_local_agent() {
        let mut server = mockito::Server::new();
        let _m = server.mock("POST", "/get_task").with_status(200).with_body(r#"{"id": 1, "url": "http://0"}"#).create();

        let client = Client::new(Some(server.url()));
        let task = client.get_task().unwrap();
        assert_eq!(task["id"], 1);
    }

    #[test]
    fn save_result_posts_payload() {
        let mut server = mockito::Server::new();
        let _m = server.mock("POST", "/save_results").with_status(200).with_body("{}").create();

        let client = Client::new(Some(server.url()));
        let result = client.save_result(&serde_json::json!({"x": 1})).unwrap();
        assert_eq!(result, serde_json::json!({}));
    }
}
