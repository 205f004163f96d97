//! Outbound calls the agent makes to the master (§4.4). Transport errors
//! retry up to 10 times with a **fixed** 3s delay between attempts — not
//! exponential backoff, matching the original `Agent._send_request`'s
//! constant-interval recursive retry. Non-transport HTTP errors are
//! reported but not retried.

use std::time::Duration;

use dispatch_core::{Agent, Runner};
use reqwest::header::HeaderValue;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::AgentConfig;

const MAX_RETRIES: u32 = 10;
const RETRY_DELAY: Duration = Duration::from_secs(3);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum MasterClientError {
    #[error("master unreachable after {0} retries")]
    Unreachable(u32),
    #[error("master responded with non-success status {0}")]
    ProtocolError(reqwest::StatusCode),
    #[error("failed to decode master response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Clone)]
pub struct MasterClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl MasterClient {
    pub fn new(config: &AgentConfig) -> Self {
        Self { http: reqwest::Client::new(), base_url: config.master_url.clone(), token: config.pymada_token_auth.clone() }
    }

    fn attach_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header("pymada_token_auth", HeaderValue::from_str(token).unwrap_or_else(|_| HeaderValue::from_static(""))),
            None => builder,
        }
    }

    /// Retries transport failures (connect/timeout) up to [`MAX_RETRIES`]
    /// times with a fixed [`RETRY_DELAY`] between attempts. A response
    /// that the server actually sent — even a non-2xx one — is returned
    /// immediately without retrying, matching §4.4/§7.
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<reqwest::Response, MasterClientError> {
        let url = format!("{}{}", self.base_url, path);

        for attempt in 0..=MAX_RETRIES {
            let mut builder = self.http.request(method.clone(), &url).timeout(REQUEST_TIMEOUT);
            builder = self.attach_auth(builder);
            if let Some(body) = body {
                builder = builder.json(body);
            }

            match builder.send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(attempt, url, error = %e, "unable to contact master, retrying");
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
                Err(e) => {
                    warn!(url, error = %e, "non-transport error contacting master");
                    return Err(MasterClientError::Unreachable(attempt));
                }
            }
        }

        Err(MasterClientError::Unreachable(MAX_RETRIES))
    }

    pub async fn register_agent(&self, hostname: String, agent_url: String, runner_num: i64) -> Result<Agent, MasterClientError> {
        let body = serde_json::json!({ "hostname": hostname, "agent_url": agent_url, "runner_num": runner_num });
        let resp = self.send(Method::POST, "/register_agent/", Some(&body)).await?;
        decode(resp).await
    }

    pub async fn get_runner(&self, runner_num: i64) -> Result<Runner, MasterClientError> {
        let path = format!("/runner/{runner_num}/");
        let resp = self.send(Method::GET, &path, None).await?;
        decode(resp).await
    }

    pub async fn put_task_result(&self, task_id: i64, task: &Value) -> Result<(), MasterClientError> {
        let path = format!("/urls/{task_id}/");
        let resp = self.send(Method::PUT, &path, Some(task)).await?;
        if !resp.status().is_success() {
            return Err(MasterClientError::ProtocolError(resp.status()));
        }
        Ok(())
    }

    pub async fn add_url<T: Serialize>(&self, payload: &T) -> Result<Value, MasterClientError> {
        let body = serde_json::to_value(payload).map_err(|_| MasterClientError::ProtocolError(reqwest::StatusCode::BAD_REQUEST))?;
        let resp = self.send(Method::POST, "/urls/", Some(&body)).await?;
        decode(resp).await
    }

    pub async fn log_error<T: Serialize>(&self, payload: &T) -> Result<Value, MasterClientError> {
        let body = serde_json::to_value(payload).map_err(|_| MasterClientError::ProtocolError(reqwest::StatusCode::BAD_REQUEST))?;
        let resp = self.send(Method::POST, "/log_error/", Some(&body)).await?;
        decode(resp).await
    }

    /// `POST /screenshots/`, multipart. Retries transport failures the
    /// same way [`Self::send`] does; duplicated rather than shared because
    /// a multipart `Form` can't be cloned for a retry the way a JSON body can.
    pub async fn upload_screenshot(&self, task_id: i64, file_name: String, bytes: Vec<u8>) -> Result<Value, MasterClientError> {
        let url = format!("{}/screenshots/", self.base_url);

        for attempt in 0..=MAX_RETRIES {
            let part = reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
            let form = reqwest::multipart::Form::new().text("task", task_id.to_string()).part("screenshot", part);

            let mut builder = self.http.post(&url).timeout(REQUEST_TIMEOUT);
            builder = self.attach_auth(builder);

            match builder.multipart(form).send().await {
                Ok(resp) => return decode(resp).await,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(attempt, url, error = %e, "unable to contact master, retrying");
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
                Err(e) => {
                    warn!(url, error = %e, "non-transport error contacting master");
                    return Err(MasterClientError::Unreachable(attempt));
                }
            }
        }

        Err(MasterClientError::Unreachable(MAX_RETRIES))
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, MasterClientError> {
    if !resp.status().is_success() {
        return Err(MasterClientError::ProtocolError(resp.status()));
    }
    resp.json().await.map_err(MasterClientError::Decode)
}
