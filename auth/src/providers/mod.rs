//! Admission providers.
//!
//! This module defines traits for all external dependencies of the
//! admission pipeline. These traits enable dependency injection and make
//! the admission logic testable against in-memory fakes.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ RateLimiter  │   │ SessionStore │
//! └──────┬───────┘   └──────┬───────┘
//!        │                  │
//!        └────────┬─────────┘
//!                 ▼
//!         ┌──────────────┐
//!         │ SharedStore  │  Redis in production, MemoryStore in tests
//!         └──────────────┘
//! ```

pub mod rate_limiter;
pub mod session;
pub mod store;

pub use rate_limiter::{RateLimitDecision, RateLimiter, time_after};
pub use session::SessionStore;
pub use store::{Batch, Command, Reply, SharedStore};
