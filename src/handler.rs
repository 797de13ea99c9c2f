use serde::Deserialize;
use serde_json::{Map, Value};

use crate::client::ApiClient;
use crate::config::OutputConfig;
use crate::dispatch::Operation;
use crate::error::{HandlerError, HandlerResult};
use crate::materialize::materialize;
use crate::storage::{B2Bucket, UploadOutcome};

#[derive(Debug, Deserialize)]
pub struct JobEvent {
    pub input: Map<String, Value>,
}

/// Clients built once at cold start and shared by every invocation.
pub struct Relay {
    pub api: ApiClient,
    pub storage: B2Bucket,
    pub output: OutputConfig,
}

// Main job handler - call the local API, persist the result, upload it, return its URL
pub async fn function_handler(event: JobEvent, relay: &Relay) -> HandlerResult<Vec<String>> {
    let input = event.input;
    let api_name = input
        .get("api_name")
        .and_then(Value::as_str)
        .ok_or_else(|| HandlerError::InvalidEvent("input.api_name must be a string".into()))?;
    let op: Operation = api_name.parse()?;

    tracing::info!(operation = %op, method = %op.method(), path = op.path(), "Running job");

    let response = relay.api.call(op, &input).await?;
    let path = materialize(relay.output.mode, &relay.output.dir, &response).await?;

    let upload_name = input.get("upload_name").and_then(Value::as_str);
    let outcome = relay.storage.upload_file(&path, upload_name).await;

    // The output directory is scratch space; one job's file never outlives it.
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove local output");
    }

    match outcome {
        UploadOutcome::Uploaded(file) => Ok(vec![relay.storage.public_url(&file)]),
        UploadOutcome::Failed(_) => Ok(Vec::new()),
    }
}
