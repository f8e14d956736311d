//! Admission configuration.
//!
//! This module provides configuration structures for session lifetimes and
//! rate limiting. Values are provided by the application (see the gateway's
//! environment loader); the defaults match a stock deployment.

use std::time::Duration;

/// Sliding-window rate-limit policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum requests per client per window.
    ///
    /// Default: 60
    pub max_requests: u32,

    /// Width of the sliding window.
    ///
    /// Default: 1 minute
    pub window: Duration,

    /// How long a client stays blocked after exceeding the limit once.
    ///
    /// Default: 5 minutes
    pub block_duration: Duration,
}

impl RateLimitPolicy {
    /// Create a policy allowing `max_requests` per minute.
    #[must_use]
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
            block_duration: Duration::from_secs(5 * 60),
        }
    }

    /// Set the window width.
    #[must_use]
    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the block duration.
    #[must_use]
    pub const fn with_block_duration(mut self, duration: Duration) -> Self {
        self.block_duration = duration;
        self
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Session and token lifetimes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Session time-to-live, extended on every authorized request.
    /// Access tokens are issued with the same lifetime.
    ///
    /// Default: 24 hours
    pub session_ttl: Duration,

    /// Refresh token lifetime.
    ///
    /// Default: 30 days
    pub refresh_ttl: Duration,
}

impl SessionConfig {
    /// Create a session configuration with the given session TTL.
    #[must_use]
    pub const fn new(session_ttl: Duration) -> Self {
        Self {
            session_ttl,
            refresh_ttl: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }

    /// Set the refresh token lifetime.
    #[must_use]
    pub const fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}
