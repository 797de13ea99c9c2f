use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::client::RetryPolicy;
use crate::error::ConfigError;
use crate::materialize::OutputMode;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_B2_ENDPOINT: &str = "https://s3.us-east-005.backblazeb2.com";
const DEFAULT_B2_REGION: &str = "us-east-005";
const REQUEST_TIMEOUT_SECS: u64 = 600;
const READY_POLL_INTERVAL_MS: u64 = 200;
const READY_TIMEOUT_SECS: u64 = 600;

/// Process configuration, read once at cold start.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub output: OutputConfig,
    pub readiness: ReadinessConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub mode: OutputMode,
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
    /// `None` polls without an attempt bound.
    pub max_attempts: Option<u32>,
    /// `None` polls without a deadline.
    pub timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct StorageConfig {
    pub account_id: String,
    pub application_key: String,
    pub bucket_name: String,
    /// S3-compatible endpoint of the bucket's region.
    pub endpoint: String,
    pub region: String,
    pub public_url_base: String,
}

// Keep the application key out of logs.
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("account_id", &self.account_id)
            .field("application_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("public_url_base", &self.public_url_base)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: parse_or(&var, "SD_MAX_RETRIES", retry_defaults.max_retries)?,
            backoff_factor: Duration::from_millis(parse_or(
                &var,
                "SD_BACKOFF_FACTOR_MS",
                u64::try_from(retry_defaults.backoff_factor.as_millis()).unwrap_or(u64::MAX),
            )?),
            ..retry_defaults
        };

        let api = ApiConfig {
            base_url: var("SD_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(parse_or(
                &var,
                "SD_REQUEST_TIMEOUT_SECS",
                REQUEST_TIMEOUT_SECS,
            )?),
            retry,
        };

        let output = OutputConfig {
            mode: parse_or(&var, "OUTPUT_MODE", OutputMode::Text)?,
            dir: var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        let ready_timeout: u64 = parse_or(&var, "READY_TIMEOUT_SECS", READY_TIMEOUT_SECS)?;
        let readiness = ReadinessConfig {
            enabled: parse_or(&var, "WAIT_FOR_SERVICE", true)?,
            poll_interval: Duration::from_millis(parse_or(
                &var,
                "READY_POLL_INTERVAL_MS",
                READY_POLL_INTERVAL_MS,
            )?),
            max_attempts: parse_opt(&var, "READY_MAX_ATTEMPTS")?,
            timeout: (ready_timeout > 0).then(|| Duration::from_secs(ready_timeout)),
        };

        let storage = StorageConfig {
            account_id: var("B2_ACCOUNT_ID").ok_or(ConfigError::Missing("B2_ACCOUNT_ID"))?,
            application_key: var("B2_APP_KEY").ok_or(ConfigError::Missing("B2_APP_KEY"))?,
            bucket_name: var("B2_BUCKET_NAME").ok_or(ConfigError::Missing("B2_BUCKET_NAME"))?,
            endpoint: var("B2_S3_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_B2_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            region: var("B2_REGION").unwrap_or_else(|| DEFAULT_B2_REGION.to_string()),
            public_url_base: var("B2_PUBLIC_URL_BASE")
                .unwrap_or_else(|| DEFAULT_B2_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        Ok(Config {
            api,
            output,
            readiness,
            storage,
        })
    }
}

fn parse_opt<T, F>(var: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { name, value: raw })
        })
        .transpose()
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(var, name)?.unwrap_or(default))
}
