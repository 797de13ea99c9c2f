use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{Map, Value};

use crate::config::ApiConfig;
use crate::dispatch::Operation;
use crate::error::{HandlerError, HandlerResult};

const MAX_BACKOFF_SECS: u64 = 120;

/// Retry budget for transient gateway errors from the local service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_factor: Duration::from_millis(100),
            max_backoff: Duration::from_secs(MAX_BACKOFF_SECS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the `retry`-th retry (1-based). The first retry is immediate,
    /// later ones double from `backoff_factor`. A server-supplied `Retry-After`
    /// wins over the computed value; both are capped at `max_backoff`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let computed = if retry <= 1 {
            Duration::ZERO
        } else {
            let multiplier = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
            self.backoff_factor.saturating_mul(multiplier)
        };
        retry_after.unwrap_or(computed).min(self.max_backoff)
    }

    pub fn is_retryable(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        )
    }
}

/// HTTP client for the local WebUI API. Built once and shared by every invocation.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            retry: config.retry,
        })
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn url_for(&self, op: Operation) -> String {
        format!("{}{}", self.base_url, op.path())
    }

    /// URL polled at startup to decide whether the service is up.
    pub fn readiness_url(&self) -> String {
        self.url_for(Operation::GetModels)
    }

    /// Calls `op` and returns the parsed JSON body. POST operations send the
    /// whole job input as the body; GET operations send nothing.
    pub async fn call(&self, op: Operation, input: &Map<String, Value>) -> HandlerResult<Value> {
        let url = self.url_for(op);
        let mut retries = 0;

        loop {
            let mut request = self.http.request(op.method(), &url);
            if op.method() == Method::POST {
                request = request.json(input);
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response.json::<Value>().await?);
            }

            if !RetryPolicy::is_retryable(status) {
                let body = response.text().await.unwrap_or_default();
                return Err(HandlerError::Status { status, body });
            }

            if retries >= self.retry.max_retries {
                return Err(HandlerError::RetriesExhausted {
                    status,
                    attempts: retries + 1,
                });
            }

            retries += 1;
            let delay = self.retry.delay_for(retries, retry_after(&response));
            tracing::warn!(
                operation = %op,
                status = status.as_u16(),
                retry = retries,
                delay = ?delay,
                "Local service unavailable, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

// Only the delta-seconds form; HTTP dates are ignored.
fn retry_after(response: &Response) -> Option<Duration> {
    if response.status() != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
