//! Route tree and middleware stack.
//!
//! ```text
//! request-id → trace → catch-panic → timeout → rate limit ─┬─ /health, /ready
//!                                            ├─ /public/*     → login origin check → handler
//!                                            └─ /protected/*  → authenticate → logout | proxy
//! ```

use crate::error::panic_response;
use crate::handlers;
use crate::middleware::{authenticate, rate_limit, request_timeout, require_login_origin};
use crate::proxy::Upstream;
use crate::state::AppState;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{any, get, post},
};
use gatekeeper_auth::providers::SharedStore;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Header used for request ids.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the gateway router.
///
/// # Routes
///
/// - `POST /public/login`, `POST /public/refresh` (allow-listed origins)
/// - `POST /protected/logout`, `ANY /protected/*path` (access token)
/// - `GET /health`, `GET /ready`
///
/// Every route passes the rate limiter first.
pub fn build<S, U>(state: AppState<S, U>) -> Router
where
    S: SharedStore,
    U: Upstream,
{
    let public = Router::new()
        .route("/login", post(handlers::login::<S, U>))
        .route("/refresh", post(handlers::refresh::<S, U>))
        .route_layer(from_fn_with_state(state.clone(), require_login_origin::<S, U>));

    let protected = Router::new()
        .route("/logout", post(handlers::logout::<S, U>))
        .route("/*path", any(handlers::forward::<S, U>))
        .route_layer(from_fn_with_state(state.clone(), authenticate::<S, U>));

    let request_id = http::HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check::<S, U>))
        .nest("/public", public)
        .nest("/protected", protected)
        .layer(from_fn_with_state(state.clone(), rate_limit::<S, U>))
        .layer(from_fn_with_state(state.clone(), request_timeout::<S, U>))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        .with_state(state)
}
