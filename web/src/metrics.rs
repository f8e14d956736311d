//! Prometheus metrics for admission and proxying.
//!
//! Counters recorded by the middleware and handlers:
//!
//! | Metric | Labels |
//! |---|---|
//! | `gatekeeper_requests_rejected_total` | `reason` = blocked, `rate_limited`, origin, unauthorized, timeout, `body_too_large` |
//! | `gatekeeper_clients_blocked_total` | |
//! | `gatekeeper_rate_limit_fail_open_total` | |
//! | `gatekeeper_logins_total` | |
//! | `gatekeeper_upstream_errors_total` | |
//! | `gatekeeper_panics_total` | |
//!
//! # Example
//!
//! ```rust,no_run
//! use gatekeeper_web::metrics::install_recorder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = install_recorder()?;
//! let app = gatekeeper_web::metrics::router(handle);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:9090").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

use axum::{Router, routing::get};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the Prometheus recorder and describe the gateway's metrics.
///
/// # Errors
///
/// Returns `MetricsError::Install` if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_metrics();
    Ok(handle)
}

/// Router serving `GET /metrics` in Prometheus text format.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || std::future::ready(handle.render())))
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "gatekeeper_requests_rejected_total",
        "Requests rejected before reaching a handler, by reason"
    );
    describe_counter!(
        "gatekeeper_clients_blocked_total",
        "Clients blocked after exceeding the rate limit"
    );
    describe_counter!(
        "gatekeeper_rate_limit_fail_open_total",
        "Requests allowed because the rate-limit count could not be taken"
    );
    describe_counter!("gatekeeper_logins_total", "Successful logins");
    describe_counter!(
        "gatekeeper_upstream_errors_total",
        "Proxied requests that failed to reach the upstream"
    );
    describe_counter!("gatekeeper_panics_total", "Requests whose handler panicked");
}
