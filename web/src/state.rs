//! Application state for Axum handlers and middleware.
//!
//! One [`AppState`] is built at startup and cloned into every request. All
//! components are cheap handles over the shared store or the upstream
//! client, so cloning never copies data.

use crate::proxy::{ProxyDirector, Upstream};
use gatekeeper_auth::providers::SharedStore;
use gatekeeper_auth::stores::{SlidingWindowLimiter, StoreSessionStore};
use gatekeeper_auth::{Gatekeeper, RateLimitPolicy};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Default cap on forwarded request bodies (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// HTTP-level admission settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Per-client rate-limit policy, applied to every route.
    pub rate_limit: RateLimitPolicy,

    /// Addresses allowed to call `/public/*` (login, refresh).
    pub login_allow_list: Vec<IpAddr>,

    /// Upper bound on handling one request.
    pub request_timeout: Duration,

    /// Largest request body forwarded upstream, in bytes.
    pub max_body_bytes: usize,
}

impl GatewaySettings {
    /// Whether `ip` may use the login and refresh endpoints.
    ///
    /// IPv4-mapped IPv6 addresses match their IPv4 form.
    #[must_use]
    pub fn allows_login_from(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.login_allow_list.iter().any(|allowed| allowed.to_canonical() == ip)
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitPolicy::default(),
            login_allow_list: vec![
                IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
            ],
            request_timeout: Duration::from_secs(10),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Application state shared across all HTTP handlers.
///
/// Generic over the shared store (`RedisStore` in production, an in-memory
/// fake in tests) and the upstream transport.
///
/// # Examples
///
/// ```ignore
/// let state = AppState::new(store, token_service, session_config, director, upstream, settings);
/// let app = gatekeeper_web::router::build(state);
/// ```
#[derive(Clone)]
pub struct AppState<S, U> {
    /// Login, refresh, admission and logout.
    pub gatekeeper: Gatekeeper<StoreSessionStore<S>>,
    /// Sliding-window limiter with block markers.
    pub limiter: SlidingWindowLimiter<S>,
    /// Raw store handle (readiness checks).
    pub store: S,
    /// Request rewriting onto the target.
    pub director: Arc<ProxyDirector>,
    /// Upstream transport.
    pub upstream: U,
    /// HTTP-level settings.
    pub settings: Arc<GatewaySettings>,
}

impl<S: SharedStore, U: Upstream> AppState<S, U> {
    /// Wire all components onto one shared store.
    #[must_use]
    pub fn new(
        store: S,
        tokens: gatekeeper_auth::TokenService,
        sessions: gatekeeper_auth::SessionConfig,
        director: ProxyDirector,
        upstream: U,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            gatekeeper: Gatekeeper::new(StoreSessionStore::new(store.clone()), tokens, sessions),
            limiter: SlidingWindowLimiter::new(store.clone()),
            store,
            director: Arc::new(director),
            upstream,
            settings: Arc::new(settings),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allow_list_is_loopback() {
        let settings = GatewaySettings::default();

        assert!(settings.allows_login_from("127.0.0.1".parse().unwrap()));
        assert!(settings.allows_login_from("::1".parse().unwrap()));
        assert!(settings.allows_login_from("::ffff:127.0.0.1".parse().unwrap()));
        assert!(!settings.allows_login_from("10.0.0.1".parse().unwrap()));
        assert!(!settings.allows_login_from("0.0.0.0".parse().unwrap()));
    }
}
