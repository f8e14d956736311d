//! Server bootstrap: store connection, router assembly and serving.

use crate::config::Config;
use axum::Router;
use gatekeeper_auth::providers::SharedStore;
use gatekeeper_auth::stores::RedisStore;
use gatekeeper_auth::{AuthError, TokenService};
use gatekeeper_web::metrics::MetricsError;
use gatekeeper_web::{AppState, HttpUpstream, ProxyDirector, UpstreamError, router};
use std::future::Future;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Errors that stop the gateway from starting or serving.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Shared store unreachable at startup
    #[error("Shared store error: {0}")]
    Store(#[from] AuthError),

    /// Upstream client could not be built
    #[error("Upstream client error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Metrics exporter could not be installed
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    /// Listener failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connect to Redis and make sure it answers.
///
/// # Errors
///
/// Returns `GatewayError::Store` if the connection or the ping fails.
pub async fn connect_store(config: &Config) -> Result<RedisStore, GatewayError> {
    info!(host = %config.redis.host, port = config.redis.port, "Connecting to Redis");
    let store = RedisStore::new(&config.redis.url()).await?;
    store.ping().await?;
    info!("Redis connected");
    Ok(store)
}

/// Assemble the gateway router on top of `store`.
///
/// # Errors
///
/// Returns `GatewayError::Upstream` if the HTTP client cannot be built.
pub fn build_router<S: SharedStore>(config: &Config, store: S) -> Result<Router, GatewayError> {
    let state = AppState::new(
        store,
        TokenService::new(config.auth.jwt_secret.as_bytes()),
        config.session_config(),
        ProxyDirector::new(config.proxy_target.clone()),
        HttpUpstream::new()?,
        config.gateway_settings(),
    );

    Ok(router::build(state))
}

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// Connection addresses are made available to the client-IP extractor.
///
/// # Errors
///
/// Returns `GatewayError::Io` if the server fails.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), GatewayError>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(address = %listener.local_addr()?, "HTTP server listening for requests");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
