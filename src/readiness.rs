use reqwest::Client;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::ReadinessConfig;
use crate::error::ReadinessError;

/// Polls `url` until the service answers with any status.
///
/// Transport failures (refused, reset or dropped connections, timeouts) count
/// as "not ready yet"; only an unusable URL is an error. The loop stops
/// early when `max_attempts` or `timeout` is reached, or when `cancel` fires.
/// With both bounds unset it polls until the service comes up.
pub async fn wait_for_service(
    http: &Client,
    url: &str,
    config: &ReadinessConfig,
    cancel: &CancellationToken,
) -> Result<u32, ReadinessError> {
    let deadline = config.timeout.map(|t| Instant::now() + t);
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
            outcome = http.get(url).send() => outcome,
        };

        match outcome {
            Ok(response) => {
                tracing::info!(
                    url,
                    attempts,
                    status = response.status().as_u16(),
                    "Local service is ready"
                );
                return Ok(attempts);
            }
            // A malformed URL will never become reachable.
            Err(e) if e.is_builder() => return Err(ReadinessError::Http(e)),
            Err(e) => {
                tracing::debug!(url, attempts, error = %e, "Local service not ready yet");
            }
        }

        let out_of_attempts = config.max_attempts.is_some_and(|max| attempts >= max);
        let past_deadline = deadline.is_some_and(|d| Instant::now() + config.poll_interval > d);
        if out_of_attempts || past_deadline {
            tracing::error!(url, attempts, "Gave up waiting for local service");
            return Err(ReadinessError::ServiceNotReady { attempts });
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
            _ = sleep(config.poll_interval) => {}
        }
    }
}
