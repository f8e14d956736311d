//! Gatekeeper Server
//!
//! Runs the authenticating reverse proxy.
//!
//! This binary:
//! - Loads configuration from the environment (and `.env`)
//! - Connects to Redis and checks it answers
//! - Serves Prometheus metrics on `METRICS_PORT`
//! - Serves the gateway on `ACCESS_PORT` until Ctrl+C or SIGTERM
//!
//! # Usage
//!
//! ```bash
//! JWT_SECRET=change-me PROXY_TARGET_URL=http://localhost:10000 cargo run --bin server
//! ```

use anyhow::Context;
use gatekeeper::{Config, server};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gatekeeper=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Gatekeeper...");

    let config = Config::from_env().context("Invalid configuration")?;
    tracing::info!(
        redis = %format!("{}:{}", config.redis.host, config.redis.port),
        target = %config.proxy_target,
        port = config.server.port,
        max_requests_per_minute = config.rate_limit.max_requests,
        "Configuration loaded"
    );

    let store = server::connect_store(&config)
        .await
        .context("Failed to connect to Redis")?;

    let handle = gatekeeper_web::metrics::install_recorder()?;
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.server.metrics_port));
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("Failed to bind metrics listener on {metrics_addr}"))?;
    tokio::spawn(async move {
        tracing::info!(address = %metrics_addr, "Metrics endpoint listening");
        if let Err(e) = axum::serve(metrics_listener, gatekeeper_web::metrics::router(handle)).await {
            tracing::error!(error = %e, "Metrics server failed");
        }
    });

    let app = server::build_router(&config, store)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    server::serve(listener, app, server::shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
