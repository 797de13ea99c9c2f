use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod client;
mod config;
mod dispatch;
mod error;
mod handler;
mod materialize;
mod readiness;
mod storage;
#[cfg(test)]
mod test_helpers;

use client::ApiClient;
use config::Config;
use handler::{function_handler, JobEvent, Relay};
use readiness::wait_for_service;
use storage::B2Bucket;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "sdapi_relay=info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env()?;
    let api = ApiClient::new(&config.api)?;

    // Block cold start until the local WebUI answers
    if config.readiness.enabled {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            trigger.cancel();
        });
        wait_for_service(api.http(), &api.readiness_url(), &config.readiness, &cancel).await?;
    }

    // Authorize against B2 once per container, not per job
    let storage = B2Bucket::connect(config.storage.clone()).await?;

    tracing::info!(
        base_url = %config.api.base_url,
        bucket = %storage.name(),
        output_mode = %config.output.mode,
        "Relay ready"
    );

    let relay = Relay {
        api,
        storage,
        output: config.output,
    };
    let relay = &relay;

    run(service_fn(move |event: LambdaEvent<JobEvent>| async move {
        Ok::<_, Error>(function_handler(event.payload, relay).await?)
    }))
    .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
