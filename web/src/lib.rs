//! Axum integration for the gatekeeper reverse proxy.
//!
//! This crate turns the admission components of `gatekeeper-auth` into an
//! HTTP gateway: rate limiting on every route, an allow-listed login
//! surface, token + session admission on protected routes, and a proxy
//! director that forwards admitted requests to the upstream.
//!
//! # Request Flow
//!
//! 1. **Rate limiter** counts the request for the client address (blocked or over limit → 429)
//! 2. **Public routes** check the login allow-list (→ 403) and run login/refresh
//! 3. **Protected routes** verify the bearer token and load its session (→ 401)
//! 4. **Proxy director** rewrites the request onto the target and forwards it (failure → 502)
//!
//! # Example
//!
//! ```ignore
//! use gatekeeper_web::{AppState, GatewaySettings, router};
//! use gatekeeper_web::proxy::{HttpUpstream, ProxyDirector};
//!
//! let state = AppState::new(store, tokens, sessions, director, HttpUpstream::new()?, settings);
//! let app = router::build(state);
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod proxy;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{Authenticated, BearerToken, ClientIp};
pub use proxy::{HttpUpstream, ProxyDirector, Upstream, UpstreamError};
pub use state::{AppState, GatewaySettings};

