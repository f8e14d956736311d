//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health. Both stay behind the rate limiter.

use crate::error::AppError;
use crate::proxy::Upstream;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use gatekeeper_auth::providers::SharedStore;
use serde_json::{Value, json};

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check the shared store.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness check: the shared store must answer a ping.
///
/// # Status Codes
///
/// - 200 OK: store reachable
/// - 503 Service Unavailable: store unreachable
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
///
/// # Response
///
/// ```json
/// { "status": "ready" }
/// ```
///
/// # Errors
///
/// Returns 503 when the store cannot be reached.
pub async fn readiness_check<S, U>(
    State(state): State<AppState<S, U>>,
) -> Result<Json<Value>, AppError>
where
    S: SharedStore,
    U: Upstream,
{
    state.store.ping().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check failed");
        AppError::unavailable("Shared store unreachable")
    })?;

    Ok(Json(json!({ "status": "ready" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
