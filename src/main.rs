//! report-cacher: keeps ShopKeep reports fresh on disk.
//!
//! Logs in to a ShopKeep back office by driving its HTML forms (there is no
//! API), exports the configured reports on a fixed interval and writes them
//! to a local directory, optionally served over HTTP for other processes.

#![warn(clippy::all)]

mod auth;
mod cli;
mod config;
mod download;
mod markup;
mod schedule;
mod serve;
mod shutdown;
#[cfg(test)]
mod test_support;
mod types;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = config::Config::from_cli(cli)?;
    config::ensure_directory(&config.directory).await?;

    tracing::info!("Starting...");
    tracing::info!("Reports will be stored in: {}", config.directory.display());

    let shutdown_token = CancellationToken::new();
    shutdown::install_signal_handler(shutdown_token.clone(), config.shutdown_grace)
        .context("Failed to install signal handlers")?;
    if let Some(limit) = config.max_run_time {
        shutdown::spawn_run_deadline(shutdown_token.clone(), limit);
    }

    let server = match config.port {
        Some(port) => {
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
                .await
                .with_context(|| format!("Failed to listen on port {}", port))?;
            let directory = config.directory.clone();
            let token = shutdown_token.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = serve::serve(listener, &directory, token).await {
                    tracing::error!("Report server failed: {}", e);
                }
            }))
        }
        None => None,
    };

    let download_config = Arc::new(config.download_config());
    let tracker = TaskTracker::new();
    schedule::run(config.interval, shutdown_token.clone(), &tracker, |_| {
        let download_config = Arc::clone(&download_config);
        async move { download::update(&download_config).await }
    })
    .await;

    tracker.close();
    if tokio::time::timeout(config.shutdown_grace, tracker.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            in_flight = tracker.len(),
            "Updates still running after {}, abandoning them",
            humantime::format_duration(config.shutdown_grace)
        );
    }

    if let Some(server) = server {
        let _ = server.await;
    }

    tracing::info!("Stopped");
    Ok(())
}
