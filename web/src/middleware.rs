//! Axum middleware for request admission.
//!
//! This module provides the admission chain:
//! - **Rate limiting**: every route, before any other work
//! - **Login origin check**: `/public/*` only accepts allow-listed addresses
//! - **Authentication**: `/protected/*` requires a valid token and live session
//! - **Request timeout**: upper bound on the whole exchange
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware::from_fn_with_state};
//! use gatekeeper_web::middleware::{authenticate, rate_limit};
//!
//! let protected = Router::new()
//!     .route("/*path", any(proxy))
//!     .route_layer(from_fn_with_state(state.clone(), authenticate));
//!
//! let app = Router::new()
//!     .nest("/protected", protected)
//!     .layer(from_fn_with_state(state.clone(), rate_limit))
//!     .with_state(state);
//! ```
//!
//! # Failure policy
//!
//! A store error while checking for a block fails the request (500); a
//! store error while counting lets it through. Credential failures always
//! reject with 401.

use crate::error::AppError;
use crate::extractors::{ClientIp, parse_bearer};
use crate::proxy::Upstream;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use gatekeeper_auth::AuthError;
use gatekeeper_auth::providers::{RateLimitDecision, RateLimiter, SharedStore, time_after};

/// `X-RateLimit-Limit` header.
pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");

/// `X-RateLimit-Remaining` header.
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// `X-RateLimit-Reset` header (Unix seconds).
pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

fn set_rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_at: DateTime<Utc>) {
    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(reset_at.timestamp()));
}

fn apply_decision(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    set_rate_limit_headers(headers, decision.limit, decision.remaining, decision.reset_at);
}

/// Per-client sliding-window rate limiting with block escalation.
///
/// # Flow
///
/// 1. Blocked client → 429 with `Retry-After` = block duration
/// 2. Count the request; over the limit → block the client, 429 with `Retry-After`
/// 3. Otherwise run the rest of the chain and add `X-RateLimit-*` headers
pub async fn rate_limit<S, U>(
    State(state): State<AppState<S, U>>,
    ClientIp(client_ip): ClientIp,
    request: Request,
    next: Next,
) -> Response
where
    S: SharedStore,
    U: Upstream,
{
    let client = client_ip.to_string();
    let policy = &state.settings.rate_limit;

    match state.limiter.is_blocked(&client).await {
        Ok(false) => {}
        Ok(true) => {
            metrics::counter!("gatekeeper_requests_rejected_total", "reason" => "blocked")
                .increment(1);
            tracing::warn!(client = %client, "Rejected request from blocked client");

            let mut response = AppError::from(AuthError::Blocked {
                retry_after: policy.block_duration,
            })
            .into_response();
            set_rate_limit_headers(
                response.headers_mut(),
                policy.max_requests,
                0,
                time_after(policy.block_duration),
            );
            return response;
        }
        Err(e) => {
            tracing::error!(client = %client, error = %e, "Block check failed");
            return AppError::from(e).into_response();
        }
    }

    let decision = match state
        .limiter
        .check(&client, policy.max_requests, policy.window)
        .await
    {
        Ok(decision) => Some(decision),
        Err(e) => {
            metrics::counter!("gatekeeper_rate_limit_fail_open_total").increment(1);
            tracing::warn!(client = %client, error = %e, "Rate limit check failed, allowing request");
            None
        }
    };

    if let Some(decision) = decision.as_ref().filter(|d| !d.allowed) {
        if let Err(e) = state.limiter.block(&client, policy.block_duration).await {
            tracing::error!(client = %client, error = %e, "Failed to block client");
        } else {
            metrics::counter!("gatekeeper_clients_blocked_total").increment(1);
        }
        metrics::counter!("gatekeeper_requests_rejected_total", "reason" => "rate_limited")
            .increment(1);

        let mut response = AppError::from(AuthError::RateLimited {
            retry_after: decision.retry_after,
        })
        .into_response();
        apply_decision(response.headers_mut(), decision);
        return response;
    }

    let mut response = next.run(request).await;
    if let Some(decision) = &decision {
        apply_decision(response.headers_mut(), decision);
    }
    response
}

/// Only allow-listed addresses may log in or refresh.
///
/// # Errors
///
/// Returns 403 for any other address.
pub async fn require_login_origin<S, U>(
    State(state): State<AppState<S, U>>,
    ClientIp(client_ip): ClientIp,
    request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    S: SharedStore,
    U: Upstream,
{
    if !state.settings.allows_login_from(client_ip) {
        metrics::counter!("gatekeeper_requests_rejected_total", "reason" => "origin").increment(1);
        tracing::warn!(client = %client_ip, path = %request.uri().path(), "Login origin not allowed");
        return Err(AppError::forbidden("Access denied"));
    }

    Ok(next.run(request).await)
}

/// Require a valid access token bound to a live session.
///
/// On success the [`AuthContext`](gatekeeper_auth::AuthContext) is placed in
/// the request extensions for [`Authenticated`](crate::extractors::Authenticated).
///
/// # Errors
///
/// - 401 for missing/malformed headers, bad tokens, or a missing/mismatched session
/// - 500 if the session cannot be read
pub async fn authenticate<S, U>(
    State(state): State<AppState<S, U>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    S: SharedStore,
    U: Upstream,
{
    let outcome = match parse_bearer(request.headers()) {
        Ok(token) => state.gatekeeper.admit(&token).await,
        Err(e) => Err(e),
    };

    let ctx = outcome.map_err(|e| {
        if e.is_unauthorized() {
            metrics::counter!("gatekeeper_requests_rejected_total", "reason" => "unauthorized")
                .increment(1);
            tracing::warn!(error = %e, path = %request.uri().path(), "Authentication failed");
        }
        AppError::from(e)
    })?;

    tracing::debug!(
        user_id = %ctx.identity.user_id,
        session_id = %ctx.session_id,
        "Request authenticated"
    );

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Abort requests that take longer than the configured timeout with 408.
pub async fn request_timeout<S, U>(
    State(state): State<AppState<S, U>>,
    request: Request,
    next: Next,
) -> Response
where
    S: SharedStore,
    U: Upstream,
{
    let limit = state.settings.request_timeout;

    if let Ok(response) = tokio::time::timeout(limit, next.run(request)).await {
        response
    } else {
        metrics::counter!("gatekeeper_requests_rejected_total", "reason" => "timeout").increment(1);
        tracing::warn!(timeout_secs = limit.as_secs(), "Request timed out");
        AppError::timeout("Request timed out").into_response()
    }
}
