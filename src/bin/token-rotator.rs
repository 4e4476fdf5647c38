use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use token_rotator::provider::HttpTokenProvider;
use token_rotator::scheduler::SchedulerCoordinator;
use token_rotator::server;
use token_rotator::store::StoreKind;
use token_rotator::utils::constants::{
    DEFAULT_CONFIG_PATH, HTTP_CLIENT_TIMEOUT_SECS, HTTP_CONNECT_TIMEOUT_SECS, USER_AGENT,
};
use token_rotator::utils::logging::LogLevel;
use token_rotator::utils::{config_loader, logging};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, start logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level)?;

    // -------------------------------
    // 2. Build collaborators
    // -------------------------------

    let store = Arc::new(StoreKind::connect(&service_config.store).await?);
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(HTTP_CLIENT_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .build()
        .context("building http client")?;
    let provider = Arc::new(HttpTokenProvider::new(client, service_config.issuer.clone()));

    // -------------------------------
    // 3. Start http server (metrics, health)
    // -------------------------------

    let server_shutdown = CancellationToken::new();
    let settings = service_config.settings.clone();
    let server_token = server_shutdown.clone();
    let http_server = tokio::spawn(async move { server::server::start(&settings, server_token).await });

    // -------------------------------
    // 4. Reconcile stored tokens and spawn refresh workers
    // -------------------------------

    let mut coordinator = SchedulerCoordinator::new(service_config, provider, store);
    coordinator.start().await?;
    info!("Service started with {} refresh workers", coordinator.workers().len());

    // -------------------------------
    // 5. Wait for a shutdown signal
    // -------------------------------

    shutdown_signal().await;
    info!("Shutdown requested");
    coordinator.stop().await;
    server_shutdown.cancel();

    match http_server.await {
        Ok(Err(e)) => error!("http server stopped with error: {:#}", e),
        Err(e) => error!("http server task failed: {}", e),
        Ok(Ok(())) => {}
    }
    info!("Service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
