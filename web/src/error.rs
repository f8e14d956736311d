//! Error types for web handlers.
//!
//! This module defines the error type that bridges admission and upstream
//! errors to HTTP responses, implementing Axum's `IntoResponse` trait.
//! Clients only ever see a terse `{code, message}` body; the underlying
//! cause is logged.

use crate::proxy::UpstreamError;
use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use gatekeeper_auth::AuthError;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::time::Duration;

/// Application error type for web handlers and middleware.
///
/// # Examples
///
/// ```
/// use gatekeeper_web::AppError;
/// use axum::http::StatusCode;
///
/// let err = AppError::forbidden("Access denied");
/// assert_eq!(err.status(), StatusCode::FORBIDDEN);
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Extra response headers (e.g. `Retry-After`)
    headers: HeaderMap,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            headers: HeaderMap::new(),
            source: None,
        }
    }

    /// Attach the underlying cause (logged, never sent).
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach a `Retry-After` header, in whole seconds (at least 1).
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        let secs = retry_after.as_secs().max(1);
        self.headers
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        self
    }

    /// Status code of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Extra headers sent with the response.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "UNAUTHORIZED".to_string(),
        )
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            message.into(),
            "FORBIDDEN".to_string(),
        )
    }

    /// Create a 408 Request Timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::REQUEST_TIMEOUT,
            message.into(),
            "TIMEOUT".to_string(),
        )
    }

    /// Create a 413 Payload Too Large error.
    #[must_use]
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            message.into(),
            "PAYLOAD_TOO_LARGE".to_string(),
        )
    }

    /// Create a 429 Too Many Requests error with `Retry-After`.
    #[must_use]
    pub fn too_many_requests(message: impl Into<String>, retry_after: Duration) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            message.into(),
            "RATE_LIMITED".to_string(),
        )
        .with_retry_after(retry_after)
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 502 Bad Gateway error.
    #[must_use]
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            message.into(),
            "BAD_GATEWAY".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log internal errors
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, self.headers, Json(body)).into_response()
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

/// Map the admission taxonomy onto HTTP.
impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuthorization => Self::unauthorized("Authorization header required"),
            AuthError::MalformedAuthorization => {
                Self::unauthorized("Invalid authorization header format")
            }
            AuthError::InvalidToken | AuthError::WrongTokenType => {
                Self::unauthorized("Invalid token")
            }
            AuthError::TokenExpired => Self::unauthorized("Token expired"),
            AuthError::SessionNotFound => Self::unauthorized("Session expired or invalid"),
            AuthError::SessionMismatch => Self::unauthorized("Session validation failed"),
            AuthError::InvalidRequest(message) => Self::bad_request(message),
            AuthError::RateLimited { retry_after } => {
                Self::too_many_requests("Rate limit exceeded", retry_after)
            }
            AuthError::Blocked { retry_after } => {
                Self::too_many_requests("Too many requests, temporarily blocked", retry_after)
            }
            AuthError::Store(_) | AuthError::Serialization(_) | AuthError::Signing(_) => {
                Self::internal("An internal error occurred").with_source(anyhow::Error::new(err))
            }
        }
    }
}

/// Turn a handler panic into a plain 500; the payload is only logged.
#[allow(clippy::needless_pass_by_value)] // signature required by `CatchPanicLayer::custom`
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    metrics::counter!("gatekeeper_panics_total").increment(1);
    tracing::error!(panic = %detail, "Request handler panicked");

    AppError::internal("An internal error occurred").into_response()
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        Self::bad_gateway("Upstream service unavailable").with_source(anyhow::Error::new(err))
    }
}
