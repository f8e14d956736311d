//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by concern.

pub mod health;
pub mod proxy;
pub mod session;

// Re-export common handler utilities
pub use health::{health_check, readiness_check};
pub use proxy::forward;
pub use session::{login, logout, refresh};
