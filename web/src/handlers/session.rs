//! Login, refresh and logout handlers.
//!
//! # Endpoints
//!
//! ```text
//! POST /public/login      {user_id, username, roles[]}  → tokens + session id
//! POST /public/refresh    Authorization: Bearer <refresh token> → new access token
//! POST /protected/logout  Authorization: Bearer <access token>  → {message}
//! ```

use crate::error::AppError;
use crate::extractors::{Authenticated, BearerToken, ClientIp};
use crate::proxy::Upstream;
use crate::state::AppState;
use axum::{Json, extract::State, extract::rejection::JsonRejection};
use gatekeeper_auth::providers::SharedStore;
use gatekeeper_auth::{LoginGrant, LoginRequest, RefreshGrant};
use serde::Serialize;

/// Body of a successful logout.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    /// Confirmation text.
    pub message: &'static str,
}

/// Log a user in and start a new session.
///
/// # Errors
///
/// - 400 if the body is not a valid login payload
/// - 500 if the session cannot be stored or tokens cannot be signed
pub async fn login<S, U>(
    State(state): State<AppState<S, U>>,
    ClientIp(client_ip): ClientIp,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginGrant>, AppError>
where
    S: SharedStore,
    U: Upstream,
{
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected login payload");
        AppError::bad_request("Invalid request format")
    })?;

    let grant = state.gatekeeper.login(request, client_ip).await?;
    metrics::counter!("gatekeeper_logins_total").increment(1);

    Ok(Json(grant))
}

/// Exchange a refresh token for a new access token.
///
/// # Errors
///
/// - 401 if the header is missing or the token is not a valid refresh token
pub async fn refresh<S, U>(
    State(state): State<AppState<S, U>>,
    BearerToken(token): BearerToken,
) -> Result<Json<RefreshGrant>, AppError>
where
    S: SharedStore,
    U: Upstream,
{
    let grant = state.gatekeeper.refresh(&token).map_err(|e| {
        tracing::warn!(error = %e, "Refresh rejected");
        AppError::from(e)
    })?;

    Ok(Json(grant))
}

/// End the caller's session. Tokens bound to it stop working immediately.
///
/// # Errors
///
/// - 500 if the session cannot be deleted
pub async fn logout<S, U>(
    State(state): State<AppState<S, U>>,
    Authenticated(ctx): Authenticated,
) -> Result<Json<LogoutResponse>, AppError>
where
    S: SharedStore,
    U: Upstream,
{
    state.gatekeeper.logout(&ctx.session_id).await?;

    Ok(Json(LogoutResponse {
        message: "Logged out successfully",
    }))
}
