//! Mock provider implementations for testing.
//!
//! This module provides in-memory implementations of the shared store for
//! use in unit and integration tests. The session store and rate limiter
//! run unchanged on top of them.

pub mod failing;
pub mod memory;

pub use failing::{FailingStore, Fault};
pub use memory::MemoryStore;
