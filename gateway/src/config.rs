//! Configuration management for the gateway.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Only `JWT_SECRET` is required. Numbers that do not parse fall back to
//! their defaults.

use gatekeeper_auth::{RateLimitPolicy, SessionConfig};
use gatekeeper_web::GatewaySettings;
use gatekeeper_web::state::DEFAULT_MAX_BODY_BYTES;
use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors while loading configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `JWT_SECRET` is unset or empty.
    #[error("JWT_SECRET must be set")]
    MissingSecret,

    /// A URL variable does not hold a usable http(s) URL.
    #[error("Invalid URL in {var}: {reason}")]
    InvalidUrl {
        /// Variable name
        var: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection
    pub redis: RedisConfig,
    /// Listener configuration
    pub server: ServerConfig,
    /// Token and session settings
    pub auth: AuthConfig,
    /// Per-client rate limit
    pub rate_limit: RateLimitPolicy,
    /// Where admitted requests are forwarded
    pub proxy_target: Url,
    /// Addresses allowed to log in
    pub login_allow_list: Vec<IpAddr>,
}

/// Redis configuration
#[derive(Clone)]
pub struct RedisConfig {
    /// Host name
    pub host: String,
    /// Port
    pub port: u16,
    /// Optional password
    pub password: Option<String>,
}

impl RedisConfig {
    /// Connection URL, with the password percent-encoded.
    #[must_use]
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}",
                urlencoding::encode(password),
                self.host,
                self.port
            ),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for the proxy listener
    pub port: u16,
    /// Port for the Prometheus scrape endpoint
    pub metrics_port: u16,
    /// Upper bound on handling one request
    pub request_timeout: Duration,
    /// Largest request body forwarded upstream
    pub max_body_bytes: usize,
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens
    pub jwt_secret: String,
    /// Session (and access token) lifetime
    pub session_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_ttl: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn default_allow_list() -> Vec<IpAddr> {
    vec![IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)]
}

fn parse_allow_list(value: Option<String>) -> Vec<IpAddr> {
    let Some(raw) = value.filter(|s| !s.trim().is_empty()) else {
        return default_allow_list();
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(entry = %entry, "Ignoring invalid LOGIN_ALLOWED_IPS entry");
                None
            }
        })
        .collect()
}

fn parse_target(value: Option<String>) -> Result<Url, ConfigError> {
    let raw = value.unwrap_or_else(|| "http://localhost:10000".to_string());
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        var: "PROXY_TARGET_URL",
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            var: "PROXY_TARGET_URL",
            reason: format!("expected an http(s) URL with a host, got {url}"),
        });
    }

    Ok(url)
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingSecret` if `JWT_SECRET` is unset or empty
    /// - `ConfigError::InvalidUrl` if `PROXY_TARGET_URL` is not an http(s) URL
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let max_requests = parse_or(lookup("MAX_REQUESTS_PER_MINUTE"), 60u32);
        let block_minutes = parse_or(lookup("BLOCK_DURATION_MINUTES"), 5u64);
        let session_hours = parse_or(lookup("SESSION_TTL_HOURS"), 24u64);
        let refresh_days = parse_or(lookup("REFRESH_TOKEN_TTL_DAYS"), 30u64);
        let timeout_secs = parse_or(lookup("REQUEST_TIMEOUT_SECONDS"), 10u64);

        Ok(Self {
            redis: RedisConfig {
                host: lookup("REDIS_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_or(lookup("REDIS_PORT"), 6379),
                password: lookup("REDIS_PASSWORD").filter(|s| !s.is_empty()),
            },
            server: ServerConfig {
                port: parse_or(lookup("ACCESS_PORT"), 8080),
                metrics_port: parse_or(lookup("METRICS_PORT"), 9090),
                request_timeout: Duration::from_secs(timeout_secs),
                max_body_bytes: parse_or(lookup("MAX_BODY_BYTES"), DEFAULT_MAX_BODY_BYTES),
            },
            auth: AuthConfig {
                jwt_secret,
                session_ttl: Duration::from_secs(session_hours.saturating_mul(3600)),
                refresh_ttl: Duration::from_secs(refresh_days.saturating_mul(86_400)),
            },
            rate_limit: RateLimitPolicy::per_minute(max_requests)
                .with_block_duration(Duration::from_secs(block_minutes.saturating_mul(60))),
            proxy_target: parse_target(lookup("PROXY_TARGET_URL"))?,
            login_allow_list: parse_allow_list(lookup("LOGIN_ALLOWED_IPS")),
        })
    }

    /// Session and token lifetimes.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.auth.session_ttl).with_refresh_ttl(self.auth.refresh_ttl)
    }

    /// HTTP-level admission settings.
    #[must_use]
    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            rate_limit: self.rate_limit.clone(),
            login_allow_list: self.login_allow_list.clone(),
            request_timeout: self.server.request_timeout,
            max_body_bytes: self.server.max_body_bytes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", "s3cret")]).unwrap();

        assert_eq!(config.redis.url(), "redis://localhost:6379");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.metrics_port, 9090);
        assert_eq!(config.server.request_timeout, Duration::from_secs(10));
        assert_eq!(config.server.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.auth.session_ttl, Duration::from_secs(24 * 3600));
        assert_eq!(config.auth.refresh_ttl, Duration::from_secs(30 * 86_400));
        assert_eq!(config.rate_limit.max_requests, 60);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.rate_limit.block_duration, Duration::from_secs(300));
        assert_eq!(config.proxy_target.as_str(), "http://localhost:10000/");
        assert_eq!(config.login_allow_list, default_allow_list());
    }

    #[test]
    fn test_missing_secret() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::MissingSecret);
        assert_eq!(
            load(&[("JWT_SECRET", "")]).unwrap_err(),
            ConfigError::MissingSecret
        );
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("JWT_SECRET", "s3cret"),
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6380"),
            ("ACCESS_PORT", "9000"),
            ("PROXY_TARGET_URL", "https://api.internal/v1"),
            ("MAX_REQUESTS_PER_MINUTE", "120"),
            ("BLOCK_DURATION_MINUTES", "1"),
            ("SESSION_TTL_HOURS", "2"),
            ("REQUEST_TIMEOUT_SECONDS", "30"),
            ("MAX_BODY_BYTES", "1024"),
            ("LOGIN_ALLOWED_IPS", "10.0.0.1, 10.0.0.2"),
        ])
        .unwrap();

        assert_eq!(config.redis.url(), "redis://cache.internal:6380");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.proxy_target.as_str(), "https://api.internal/v1");
        assert_eq!(config.rate_limit.max_requests, 120);
        assert_eq!(config.rate_limit.block_duration, Duration::from_secs(60));
        assert_eq!(config.auth.session_ttl, Duration::from_secs(7200));
        assert_eq!(config.server.request_timeout, Duration::from_secs(30));
        assert_eq!(config.gateway_settings().max_body_bytes, 1024);
        assert_eq!(
            config.login_allow_list,
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "10.0.0.2".parse::<IpAddr>().unwrap()
            ]
        );

        let settings = config.gateway_settings();
        assert!(settings.allows_login_from("10.0.0.2".parse().unwrap()));
        assert!(!settings.allows_login_from("127.0.0.1".parse().unwrap()));
        assert_eq!(config.session_config().session_ttl, Duration::from_secs(7200));
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let config = load(&[
            ("JWT_SECRET", "s3cret"),
            ("REDIS_PORT", "not-a-port"),
            ("MAX_REQUESTS_PER_MINUTE", "-5"),
            ("SESSION_TTL_HOURS", "1.5"),
        ])
        .unwrap();

        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.rate_limit.max_requests, 60);
        assert_eq!(config.auth.session_ttl, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_redis_password_is_encoded() {
        let config = load(&[("JWT_SECRET", "s3cret"), ("REDIS_PASSWORD", "p@ss:w/rd")]).unwrap();

        assert_eq!(config.redis.url(), "redis://:p%40ss%3Aw%2Frd@localhost:6379");
        assert!(!format!("{config:?}").contains("p@ss"));
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn test_invalid_target_url() {
        for target in ["not a url", "ftp://files.internal", "unix:/run/app.sock"] {
            let err = load(&[("JWT_SECRET", "s3cret"), ("PROXY_TARGET_URL", target)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidUrl { var: "PROXY_TARGET_URL", .. }),
                "{target}: {err:?}"
            );
        }
    }

    #[test]
    fn test_invalid_allow_list_entries_are_skipped() {
        let config = load(&[
            ("JWT_SECRET", "s3cret"),
            ("LOGIN_ALLOWED_IPS", "10.0.0.1,bogus,::1"),
        ])
        .unwrap();

        assert_eq!(config.login_allow_list.len(), 2);
    }
}
