//! Proxy director and upstream transport.
//!
//! The director rewrites an admitted request onto the configured target:
//! scheme and authority are replaced, the target's base path is joined with
//! the wildcard suffix, and the query string is kept. The [`Upstream`]
//! trait performs the actual exchange; [`HttpUpstream`] backs it with
//! `reqwest`.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Response, Uri, header};
use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors from the upstream exchange.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The target could not be reached.
    #[error("Failed to connect to upstream: {0}")]
    Connect(String),

    /// The upstream did not answer in time.
    #[error("Upstream timed out")]
    Timeout,

    /// Any other transport failure.
    #[error("Upstream transport error: {0}")]
    Transport(String),

    /// The rewritten request is not valid.
    #[error("Invalid upstream request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Transport that sends a rewritten request to the backend.
pub trait Upstream: Clone + Send + Sync + 'static {
    /// Forward `request` (absolute URI) and return the backend's response.
    ///
    /// The body has already been buffered within the configured size cap.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError` if the backend cannot be reached or the
    /// exchange fails midway.
    fn forward(
        &self,
        request: Request<Body>,
    ) -> impl std::future::Future<Output = Result<Response<Body>, UpstreamError>> + Send;
}

/// Headers that describe a single hop and must not be forwarded.
static HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// Join the target base path and the incoming suffix with exactly one `/`.
///
/// ```
/// use gatekeeper_web::proxy::join_path;
///
/// assert_eq!(join_path("/api", "users/1"), "/api/users/1");
/// assert_eq!(join_path("/api/", "/users/1"), "/api/users/1");
/// assert_eq!(join_path("", "users"), "/users");
/// ```
#[must_use]
pub fn join_path(base: &str, suffix: &str) -> String {
    let base = base.trim_end_matches('/');
    let suffix = suffix.trim_start_matches('/');
    format!("{base}/{suffix}")
}

/// Rewrites admitted requests onto the upstream target.
#[derive(Debug, Clone)]
pub struct ProxyDirector {
    target: Url,
}

impl ProxyDirector {
    /// Create a director for `target` (e.g. `http://localhost:10000/api`).
    #[must_use]
    pub const fn new(target: Url) -> Self {
        Self { target }
    }

    /// The configured target.
    #[must_use]
    pub const fn target(&self) -> &Url {
        &self.target
    }

    /// Upstream URL for a wildcard `suffix` and optional `query`.
    #[must_use]
    pub fn rewrite(&self, suffix: &str, query: Option<&str>) -> Url {
        let mut url = self.target.clone();
        url.set_path(&join_path(self.target.path(), suffix));
        url.set_query(query);
        url
    }

    /// Turn an inbound request into the one sent upstream.
    ///
    /// Method, body and end-to-end headers are kept. `Host` is dropped so
    /// the transport sets it to the upstream authority, and the client
    /// address is appended to `X-Forwarded-For`.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::InvalidRequest` if the rewritten URI is invalid.
    pub fn direct(
        &self,
        mut request: Request<Body>,
        suffix: &str,
        client_ip: IpAddr,
    ) -> Result<Request<Body>, UpstreamError> {
        let url = self.rewrite(suffix, request.uri().query());
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| UpstreamError::InvalidRequest(format!("Failed to build upstream URI: {e}")))?;
        *request.uri_mut() = uri;

        let headers = request.headers_mut();
        strip_hop_by_hop(headers);
        headers.remove(header::HOST);

        let forwarded_for = match headers
            .get(crate::extractors::X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
        {
            Some(prior) => format!("{prior}, {client_ip}"),
            None => client_ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(crate::extractors::X_FORWARDED_FOR, value);
        }

        Ok(request)
    }
}

/// [`Upstream`] over a shared `reqwest` client (connection pooling, TLS).
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    /// Build a client that never follows redirects (they go back to the caller).
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Transport` if the client cannot be built.
    pub fn new() -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

impl Upstream for HttpUpstream {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        let (mut parts, body) = request.into_parts();
        // Already buffered and capped by the forward handler.
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| UpstreamError::InvalidRequest(format!("Failed to read request body: {e}")))?;

        // Length is recomputed from the buffered body.
        parts.headers.remove(header::CONTENT_LENGTH);

        let upstream = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        Ok(response)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_join_path_cases() {
        assert_eq!(join_path("/api", "users/1"), "/api/users/1");
        assert_eq!(join_path("/api/", "users/1"), "/api/users/1");
        assert_eq!(join_path("/api", "/users/1"), "/api/users/1");
        assert_eq!(join_path("/", "/"), "/");
        assert_eq!(join_path("", ""), "/");
    }

    proptest! {
        #[test]
        fn prop_join_path_has_single_separator(
            base in "(/[a-z0-9]{1,8}){0,3}/?",
            suffix in "/?([a-z0-9]{1,8}/){0,3}[a-z0-9]{1,8}",
        ) {
            let joined = join_path(&base, &suffix);
            prop_assert!(joined.starts_with('/'));
            prop_assert!(!joined.contains("//"));
            prop_assert!(joined.ends_with(suffix.trim_start_matches('/')));
            prop_assert!(joined.starts_with(base.trim_end_matches('/')));
        }
    }

    #[test]
    fn test_rewrite_keeps_target_and_query() {
        let director = ProxyDirector::new(Url::parse("http://backend:10000/api").unwrap());

        let url = director.rewrite("/users/1", Some("page=2&sort=asc"));

        assert_eq!(url.as_str(), "http://backend:10000/api/users/1?page=2&sort=asc");
    }

    #[test]
    fn test_direct_rewrites_uri_and_headers() {
        let director = ProxyDirector::new(Url::parse("http://backend:10000/").unwrap());
        let request = Request::builder()
            .uri("/orders?id=7")
            .header(header::HOST, "gateway.local")
            .header(header::CONNECTION, "keep-alive, x-private")
            .header("x-private", "1")
            .header(header::AUTHORIZATION, "Bearer t")
            .header("x-forwarded-for", "198.51.100.1")
            .body(Body::empty())
            .unwrap();

        let directed = director
            .direct(request, "/orders", "10.0.0.1".parse().unwrap())
            .unwrap();

        assert_eq!(directed.uri().to_string(), "http://backend:10000/orders?id=7");
        let headers = directed.headers();
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("x-private").is_none());
        assert_eq!(headers[header::AUTHORIZATION], "Bearer t");
        assert_eq!(headers["x-forwarded-for"], "198.51.100.1, 10.0.0.1");
    }

    #[test]
    fn test_strip_hop_by_hop_keeps_end_to_end_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }
}
