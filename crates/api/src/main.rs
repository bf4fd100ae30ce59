//! DoseTrack - self-hosted medication reminder service
//!
//! Main entry point for the HTTP server.

use std::sync::Arc;

use anyhow::Context as _;
use dosetrack_app::{build_router, AppContext};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging first so .env loading is visible
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) => info!(error = %err, "no .env file loaded"),
    }

    let config = dosetrack_infra::config::load().context("failed to load configuration")?;
    let bind_addr = config.server.bind_addr.clone();

    info!(db_path = %config.database.path, "DoseTrack starting");

    let ctx = Arc::new(
        AppContext::new_with_config(config)
            .await
            .context("failed to initialize application context")?,
    );
    ctx.start().await.context("failed to start background tasks")?;

    let router = build_router(Arc::clone(&ctx));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!(addr = %bind_addr, "DoseTrack listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Err(err) = ctx.shutdown().await {
        warn!(error = %err, "shutdown reported an error");
    }
    info!("DoseTrack stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => warn!(error = %err, "failed to listen for shutdown signal"),
    }
}
