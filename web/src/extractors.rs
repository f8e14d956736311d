//! Custom Axum extractors.
//!
//! This module contains custom extractors for the gateway:
//! - `ClientIp`: client address from proxy headers or the connection
//! - `BearerToken`: raw token from `Authorization: Bearer <token>`
//! - `Authenticated`: the `AuthContext` placed by the admission middleware
//!
//! # Examples
//!
//! ```ignore
//! use gatekeeper_web::extractors::{Authenticated, ClientIp};
//!
//! async fn handler(client_ip: ClientIp, Authenticated(ctx): Authenticated) -> String {
//!     format!("{} from {}", ctx.identity.username, client_ip.0)
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequestParts, connect_info::ConnectInfo},
    http::{HeaderMap, header, request::Parts},
};
use gatekeeper_auth::{AuthContext, AuthError};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Header carrying the proxy chain, client first.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Header carrying the client address set by a front proxy.
pub const X_REAL_IP: &str = "x-real-ip";

/// Client IP address.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first IP in the list)
/// 2. `X-Real-IP`
/// 3. Connection IP (port stripped)
///
/// When none is available the address is `0.0.0.0`, which is never on an
/// allow-list.
///
/// # Example
///
/// ```ignore
/// async fn handler(client_ip: ClientIp) -> String {
///     format!("Client IP: {}", client_ip.0)
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Also picks up `MockConnectInfo` in tests.
        let peer = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr);
        let ip = extract_client_ip(&parts.headers, peer);

        Ok(Self(ip))
    }
}

/// Parse `203.0.113.1`, `[::1]`, `::1` or `203.0.113.1:8080` into an address.
fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
        .or_else(|| {
            raw.strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .and_then(|s| s.parse::<IpAddr>().ok())
        })
}

/// Extract client IP from headers or connection info.
#[must_use]
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(parse_ip);

    let real_ip = || {
        headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_ip)
    };

    forwarded
        .or_else(real_ip)
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Raw bearer token from the `Authorization` header.
///
/// Rejects with 401 when the header is missing or not `Bearer <token>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_bearer(&parts.headers).map(Self).map_err(AppError::from)
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// # Errors
///
/// - `AuthError::MissingAuthorization` if there is no header
/// - `AuthError::MalformedAuthorization` if it is not a non-empty bearer token
pub fn parse_bearer(headers: &HeaderMap) -> Result<String, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?
        .to_str()
        .map_err(|_| AuthError::MalformedAuthorization)?;

    // Auth schemes are case-insensitive (RFC 7235).
    let token = value
        .split_once(char::is_whitespace)
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MalformedAuthorization)?;

    Ok(token.to_string())
}

/// Admission result of the current request.
///
/// Only available behind the authentication middleware; elsewhere the
/// extractor fails closed with 401.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_client_ip_from_x_forwarded_for() {
        let mut parts = parts(&[
            ("X-Forwarded-For", "203.0.113.1, 198.51.100.1"),
            ("X-Real-IP", "198.51.100.42"),
        ]);

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "203.0.113.1");
    }

    #[tokio::test]
    async fn test_client_ip_from_x_real_ip() {
        let mut parts = parts(&[("X-Real-IP", "198.51.100.42")]);
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 4000))));

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "198.51.100.42");
    }

    #[tokio::test]
    async fn test_client_ip_from_connection_strips_port() {
        let mut parts = parts(&[]);
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 4000))));

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "10.0.0.9");
    }

    #[tokio::test]
    async fn test_client_ip_fallback_is_unspecified() {
        let mut parts = parts(&[("X-Forwarded-For", "garbage")]);

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn test_parse_ip_forms() {
        assert_eq!(parse_ip("::1"), Some("::1".parse().unwrap()));
        assert_eq!(parse_ip("[::1]"), Some("::1".parse().unwrap()));
        assert_eq!(parse_ip("[::1]:8080"), Some("::1".parse().unwrap()));
        assert_eq!(parse_ip(" 127.0.0.1:80 "), Some("127.0.0.1".parse().unwrap()));
        assert_eq!(parse_ip("localhost"), None);
    }

    #[tokio::test]
    async fn test_bearer_token() {
        for value in ["Bearer abc.def.ghi", "bearer abc.def.ghi", "BEARER  abc.def.ghi "] {
            let mut ok = parts(&[("Authorization", value)]);
            let token = BearerToken::from_request_parts(&mut ok, &()).await.unwrap();
            assert_eq!(token.0, "abc.def.ghi");
        }

        for headers in [
            vec![],
            vec![("Authorization", "Basic dXNlcjpwYXNz")],
            vec![("Authorization", "Bearer ")],
            vec![("Authorization", "Bearer")],
            vec![("Authorization", "Bearerabc")],
        ] {
            let mut parts = parts(&headers);
            let err = BearerToken::from_request_parts(&mut parts, &())
                .await
                .unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_missing_and_malformed_are_distinct() {
        assert_eq!(
            parse_bearer(&HeaderMap::new()),
            Err(AuthError::MissingAuthorization)
        );
        assert_eq!(
            parse_bearer(&parts(&[("Authorization", "Token x")]).headers),
            Err(AuthError::MalformedAuthorization)
        );
    }

    #[tokio::test]
    async fn test_authenticated_requires_middleware() {
        let mut parts = parts(&[]);
        let err = Authenticated::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
