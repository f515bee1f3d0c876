//! Sentinel Projects - Main Entry Point

use anyhow::Context;
use sentinel_projects::{Runtime, ServiceConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Sentinel Projects v{}", env!("CARGO_PKG_VERSION"));

    // Load config
    let config_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| "/etc/sentinel/projects.json".into());

    let config = ServiceConfig::load(&config_path)
        .unwrap_or_else(|e| {
            tracing::warn!(path = %config_path, error = %e, "Config not loaded, using defaults");
            ServiceConfig::default()
        })
        .with_env()
        .context("invalid environment override")?;

    let mut runtime = Runtime::start(&config).context("failed to build tenant service client")?;

    // No broker adapter is attached; log what would be published.
    if let Some(mut outbound) = runtime.take_outbound() {
        tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                tracing::debug!(
                    exchange = %message.exchange,
                    routing_key = %message.routing_key,
                    bytes = message.body.len(),
                    "Outbound event"
                );
            }
        });
    }

    tracing::info!("Sentinel Projects ready");
    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;

    tracing::info!("Shutting down");
    runtime.shutdown().await;

    Ok(())
}
