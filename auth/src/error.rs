//! Error types for admission, token and session operations.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for gatekeeper auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Error taxonomy for the request-admission pipeline.
///
/// Variants are grouped by how the HTTP layer treats them: credential
/// failures always fail closed with 401, rate-limit failures with 429,
/// and store/signing failures are internal and never shown to clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Credential Errors
    // ═══════════════════════════════════════════════════════════

    /// No `Authorization` header was sent.
    #[error("Missing Authorization header")]
    MissingAuthorization,

    /// `Authorization` header is not of the form `Bearer <token>`.
    #[error("Invalid Authorization header format")]
    MalformedAuthorization,

    /// Token signature, algorithm or claims are invalid.
    #[error("Invalid token")]
    InvalidToken,

    /// Token `exp` is in the past or `nbf` in the future.
    #[error("Token expired or not yet valid")]
    TokenExpired,

    /// A refresh token was presented where an access token is expected, or vice versa.
    #[error("Wrong token type")]
    WrongTokenType,

    // ═══════════════════════════════════════════════════════════
    // Session Errors
    // ═══════════════════════════════════════════════════════════

    /// Session does not exist (never created, expired, or deleted).
    #[error("Session not found")]
    SessionNotFound,

    /// Token and session disagree about the user.
    #[error("Session validation failed")]
    SessionMismatch,

    // ═══════════════════════════════════════════════════════════
    // Request Errors
    // ═══════════════════════════════════════════════════════════

    /// Login payload is malformed or misses required fields.
    #[error("{0}")]
    InvalidRequest(String),

    // ═══════════════════════════════════════════════════════════
    // Rate Limiting
    // ═══════════════════════════════════════════════════════════

    /// Client exceeded the sliding-window limit.
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// Client is currently serving a temporary block.
    #[error("Client temporarily blocked, retry after {retry_after:?}")]
    Blocked {
        /// Duration of the block
        retry_after: Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Shared state store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Session document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Token could not be signed.
    #[error("Signing error: {0}")]
    Signing(String),
}

impl AuthError {
    /// Returns `true` if the error means the caller's credentials were rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// # use gatekeeper_auth::AuthError;
    /// assert!(AuthError::SessionMismatch.is_unauthorized());
    /// assert!(!AuthError::Store("down".into()).is_unauthorized());
    /// ```
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::MissingAuthorization
                | Self::MalformedAuthorization
                | Self::InvalidToken
                | Self::TokenExpired
                | Self::WrongTokenType
                | Self::SessionNotFound
                | Self::SessionMismatch
        )
    }

    /// Returns `true` if the error is a rate-limit rejection.
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Blocked { .. })
    }

    /// Returns `true` for failures of the gateway itself rather than the caller.
    ///
    /// # Examples
    ///
    /// ```
    /// # use gatekeeper_auth::AuthError;
    /// assert!(AuthError::Signing("bad key".into()).is_internal());
    /// assert!(!AuthError::InvalidToken.is_internal());
    /// ```
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Serialization(_) | Self::Signing(_)
        )
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
