//! Rate limiter trait for inbound requests.
//!
//! # Implementation
//!
//! Sliding-window log in the shared store plus a per-client block marker.

use crate::error::Result;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Outcome of one sliding-window check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request fits in the window.
    pub allowed: bool,
    /// Configured limit for the window.
    pub limit: u32,
    /// Requests still available in the current window after this one.
    pub remaining: u32,
    /// When a full window will have elapsed from now.
    pub reset_at: DateTime<Utc>,
    /// How long to wait before retrying; zero when allowed.
    pub retry_after: Duration,
}

/// `now + duration`, saturating at the latest representable instant.
#[must_use]
pub fn time_after(duration: Duration) -> DateTime<Utc> {
    let delta = TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX);
    Utc::now()
        .checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Per-client admission counter with temporary blocking.
///
/// # Security
///
/// Limits abusive clients before any token or session work happens.
/// A single violation escalates to a full block (enforced by the caller).
///
/// # Example
///
/// ```no_run
/// use gatekeeper_auth::providers::RateLimiter;
/// use std::time::Duration;
///
/// # async fn example(limiter: impl RateLimiter) -> Result<(), Box<dyn std::error::Error>> {
/// if limiter.is_blocked("203.0.113.7").await? {
///     return Ok(());
/// }
///
/// let decision = limiter.check("203.0.113.7", 60, Duration::from_secs(60)).await?;
/// if !decision.allowed {
///     limiter.block("203.0.113.7", Duration::from_secs(300)).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub trait RateLimiter: Send + Sync {
    /// Record a request and decide whether it fits in the window.
    ///
    /// # Arguments
    ///
    /// * `client` - Client key (IP address)
    /// * `limit` - Maximum requests per window
    /// * `window` - Sliding window width
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn check(
        &self,
        client: &str,
        limit: u32,
        window: Duration,
    ) -> impl std::future::Future<Output = Result<RateLimitDecision>> + Send;

    /// Whether a block marker exists for the client.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn is_blocked(&self, client: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Block the client for `duration`.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn block(
        &self,
        client: &str,
        duration: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
