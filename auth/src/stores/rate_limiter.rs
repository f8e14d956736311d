//! Sliding-window rate limiter on top of a [`SharedStore`].
//!
//! # Algorithm
//!
//! Sliding window log with ordered sets, in one atomic batch:
//! 1. Remove entries older than `now - window` (ZREMRANGEBYSCORE)
//! 2. Count what is left (ZCARD)
//! 3. Add the current request (ZADD)
//! 4. Refresh the key expiry to `window + 1 minute` (PEXPIRE)
//!
//! The count is taken before the insert, so the `limit + 1`-th request in
//! a window is the first one rejected.
//!
//! # Security
//!
//! Block markers live under a separate key with their own TTL; the window
//! state is irrelevant while a marker exists.

use crate::constants::keys;
use crate::error::{AuthError, Result};
use crate::providers::{Batch, RateLimitDecision, RateLimiter, SharedStore, time_after};
use chrono::Utc;
use std::time::Duration;

/// Extra lifetime of an idle window key beyond the window itself.
const KEY_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// [`RateLimiter`] backed by any [`SharedStore`].
///
/// # Example
///
/// ```no_run
/// use gatekeeper_auth::stores::{RedisStore, SlidingWindowLimiter};
/// use gatekeeper_auth::providers::RateLimiter;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = SlidingWindowLimiter::new(RedisStore::new("redis://127.0.0.1:6379").await?);
///
/// let decision = limiter.check("203.0.113.7", 60, Duration::from_secs(60)).await?;
/// println!("{} requests left", decision.remaining);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SlidingWindowLimiter<S> {
    store: S,
}

impl<S: SharedStore> SlidingWindowLimiter<S> {
    /// Wrap a shared store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Microseconds since the Unix epoch, as an ordered-set score.
    #[allow(clippy::cast_precision_loss)] // Exact below 2^53 µs (year 2255)
    fn now_micros() -> f64 {
        Utc::now().timestamp_micros() as f64
    }

    #[allow(clippy::cast_precision_loss)]
    fn micros(duration: Duration) -> f64 {
        duration.as_micros() as f64
    }

    /// Time until the oldest surviving entry leaves the window.
    ///
    /// Falls back to a full window when the entry is gone, already stale,
    /// or cannot be read. The over-limit decision stands either way.
    async fn retry_after(&self, client: &str, key: &str, now: f64, window: Duration) -> Duration {
        let oldest = match self.store.oldest(key).await {
            Ok(Some((_, score))) => score,
            Ok(None) => return window,
            Err(e) => {
                tracing::warn!(
                    client = %client,
                    error = %e,
                    "Failed to read oldest window entry, using full window"
                );
                return window;
            }
        };

        let wait = Self::micros(window) - (now - oldest);
        if wait <= 0.0 {
            return window;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // wait > 0 and < window
        Duration::from_micros(wait as u64)
    }
}

impl<S: SharedStore> RateLimiter for SlidingWindowLimiter<S> {
    async fn check(&self, client: &str, limit: u32, window: Duration) -> Result<RateLimitDecision> {
        let key = keys::rate_limit(client);
        let now = Self::now_micros();
        let window_start = now - Self::micros(window);
        let member = format!("{now:.0}-{}", uuid::Uuid::new_v4());

        let replies = self
            .store
            .exec_atomic(
                Batch::new()
                    .zrem_range_by_score(&key, 0.0, window_start)
                    .zcard(&key)
                    .zadd(&key, now, member)
                    .pexpire(&key, window + KEY_EXPIRY_MARGIN),
            )
            .await?;

        let count_before = replies
            .get(1)
            .and_then(crate::providers::Reply::as_int)
            .ok_or_else(|| AuthError::Store("Missing window cardinality in batch reply".into()))?;
        let count_before = u32::try_from(count_before).unwrap_or(u32::MAX);

        let allowed = count_before.saturating_add(1) <= limit;
        let remaining = limit.saturating_sub(count_before.saturating_add(1));
        let reset_at = time_after(window);

        let retry_after = if allowed {
            Duration::ZERO
        } else {
            self.retry_after(client, &key, now, window).await
        };

        if allowed {
            tracing::debug!(
                client = %client,
                count = count_before + 1,
                limit,
                "Rate limit check passed"
            );
        } else {
            tracing::warn!(
                client = %client,
                count = count_before.saturating_add(1),
                limit,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
        }

        Ok(RateLimitDecision {
            allowed,
            limit,
            remaining,
            reset_at,
            retry_after,
        })
    }

    async fn is_blocked(&self, client: &str) -> Result<bool> {
        self.store.exists(&keys::block(client)).await
    }

    async fn block(&self, client: &str, duration: Duration) -> Result<()> {
        let blocked_at = Utc::now().timestamp().to_string();
        self.store
            .set_ex(&keys::block(client), &blocked_at, duration)
            .await?;

        tracing::info!(
            client = %client,
            duration_secs = duration.as_secs(),
            "Client blocked"
        );

        Ok(())
    }
}
