//! Storage implementations for the admission pipeline.
//!
//! - **Redis Store** - the production [`SharedStore`](crate::providers::SharedStore)
//! - **Session Store** - sessions as JSON documents with sliding TTL
//! - **Rate Limiter** - sliding-window log plus block markers

pub mod rate_limiter;
pub mod redis_store;
pub mod session_store;

// Re-exports
pub use rate_limiter::SlidingWindowLimiter;
pub use redis_store::RedisStore;
pub use session_store::StoreSessionStore;
