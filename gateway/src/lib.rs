//! # Gatekeeper
//!
//! Authenticating reverse proxy. Every request is rate limited per client
//! address; login is restricted to allow-listed addresses; everything under
//! `/protected/` needs a valid access token bound to a live session and is
//! then forwarded to the configured target.
//!
//! This crate holds the deployable pieces: environment configuration,
//! server bootstrap, and the `server` binary. The admission logic lives in
//! `gatekeeper-auth` and the HTTP layer in `gatekeeper-web`.
//!
//! ```rust,ignore
//! let config = gatekeeper::Config::from_env()?;
//! let store = gatekeeper::server::connect_store(&config).await?;
//! let app = gatekeeper::server::build_router(&config, store)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]

pub mod config;
pub mod server;

pub use config::{Config, ConfigError};
pub use server::GatewayError;
