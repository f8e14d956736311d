//! # Gatekeeper Admission
//!
//! Request admission for the gatekeeper reverse proxy: who may talk to the
//! upstream, and how often.
//!
//! ## Features
//!
//! - **Sliding-window rate limiting**: per-client log in the shared store, with
//!   temporary blocking after a single violation
//! - **Session-bound tokens**: HS256 access and refresh tokens that are only
//!   honored while their server-side session exists
//! - **One session per user**: a new login supersedes the previous session
//! - **Testable**: every component runs against an in-memory store
//!
//! ## Architecture
//!
//! ```text
//!   RateLimiter ─┐                 ┌─ TokenService
//!                ├─ SharedStore    │
//!  SessionStore ─┘   (Redis)       └─ Gatekeeper ── SessionStore
//! ```
//!
//! ## Example: Login and Admission
//!
//! ```no_run
//! use gatekeeper_auth::config::SessionConfig;
//! use gatekeeper_auth::gatekeeper::{Gatekeeper, LoginRequest};
//! use gatekeeper_auth::stores::{RedisStore, StoreSessionStore};
//! use gatekeeper_auth::tokens::TokenService;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisStore::new("redis://127.0.0.1:6379").await?;
//! let gatekeeper = Gatekeeper::new(
//!     StoreSessionStore::new(store),
//!     TokenService::new(b"a-long-random-secret"),
//!     SessionConfig::default(),
//! );
//!
//! let request = LoginRequest {
//!     user_id: "1".into(),
//!     username: "alice".into(),
//!     roles: vec!["USER".into()],
//! };
//! let grant = gatekeeper.login(request, "127.0.0.1".parse()?).await?;
//!
//! let ctx = gatekeeper.admit(&grant.token).await?;
//! assert_eq!(ctx.session_id, grant.session_id);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod constants;
pub mod error;
pub mod gatekeeper;
pub mod providers;
pub mod state;
pub mod stores;
pub mod tokens;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use config::{RateLimitPolicy, SessionConfig};
pub use error::{AuthError, Result};
pub use gatekeeper::{Gatekeeper, LoginGrant, LoginRequest, RefreshGrant};
pub use state::{AuthContext, Identity, Session, SessionId, UserId};
pub use tokens::TokenService;
