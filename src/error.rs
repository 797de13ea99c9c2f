use reqwest::StatusCode;
use thiserror::Error;

/// Errors that fail a single invocation. The runtime reports them as a failed job.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unimplemented method: {0}")]
    UnknownOperation(String),

    #[error("invalid job event: {0}")]
    InvalidEvent(String),

    #[error("request to local service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("local service answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("local service still answering {status} after {attempts} attempts")]
    RetriesExhausted { status: StatusCode, attempts: u32 },

    #[error("malformed service response: {0}")]
    MalformedResponse(String),

    #[error("invalid base64 image payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("service not ready after {attempts} attempts")]
    ServiceNotReady { attempts: u32 },

    #[error("wait for service cancelled")]
    Cancelled,

    #[error("readiness check failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Object storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

pub type HandlerResult<T> = Result<T, HandlerError>;
pub type StorageResult<T> = Result<T, StorageError>;
