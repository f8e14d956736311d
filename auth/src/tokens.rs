//! Bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs. Both kinds carry a `type` claim and each
//! verifier accepts only its own kind, so a refresh token can never be
//! replayed as an access token (or the other way round).

use crate::constants::token_types;
use crate::error::{AuthError, Result};
use crate::state::{SessionId, UserId};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The only signing algorithm issued or accepted.
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT claims shared by access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User the token was issued to.
    pub user_id: UserId,
    /// Display name at issue time.
    pub username: String,
    /// Session the token is bound to.
    pub session_id: SessionId,
    /// `"access"` or `"refresh"`.
    #[serde(rename = "type")]
    pub token_type: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Not before (Unix seconds).
    pub nbf: i64,
    /// Expires at (Unix seconds).
    pub exp: i64,
}

impl Claims {
    fn new(
        user_id: &UserId,
        username: &str,
        session_id: &SessionId,
        token_type: &str,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            user_id: user_id.clone(),
            username: username.to_string(),
            session_id: session_id.clone(),
            token_type: token_type.to_string(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(ttl_secs),
        }
    }
}

/// Stateless signer/verifier for access and refresh tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    /// Create a token service from the shared signing secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "nbf"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue an access token valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if encoding fails.
    pub fn issue_access(
        &self,
        user_id: &UserId,
        username: &str,
        session_id: &SessionId,
        ttl: Duration,
    ) -> Result<String> {
        self.sign(&Claims::new(user_id, username, session_id, token_types::ACCESS, ttl))
    }

    /// Issue a refresh token valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if encoding fails.
    pub fn issue_refresh(
        &self,
        user_id: &UserId,
        username: &str,
        session_id: &SessionId,
        ttl: Duration,
    ) -> Result<String> {
        self.sign(&Claims::new(user_id, username, session_id, token_types::REFRESH, ttl))
    }

    /// Verify an access token.
    ///
    /// # Errors
    ///
    /// - `AuthError::TokenExpired` if `exp` has passed or `nbf` is in the future
    /// - `AuthError::WrongTokenType` for a refresh token
    /// - `AuthError::InvalidToken` for anything else (bad signature, wrong algorithm, garbage)
    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        self.verify(token, token_types::ACCESS)
    }

    /// Verify a refresh token.
    ///
    /// # Errors
    ///
    /// Same as [`Self::verify_access`], with `WrongTokenType` for access tokens.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims> {
        self.verify(token, token_types::REFRESH)
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "Failed to encode JWT");
            AuthError::Signing(format!("Failed to encode token: {e}"))
        })
    }

    fn verify(&self, token: &str, expected_type: &str) -> Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token validation failed");
                match e.kind() {
                    ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => {
                        AuthError::TokenExpired
                    }
                    _ => AuthError::InvalidToken,
                }
            })?;

        if claims.token_type != expected_type {
            tracing::debug!(
                expected = expected_type,
                actual = %claims.token_type,
                "Token type mismatch"
            );
            return Err(AuthError::WrongTokenType);
        }

        Ok(claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

    fn ids() -> (UserId, SessionId) {
        (UserId("1".into()), SessionId::new())
    }

    fn forge(claims: &Claims, algorithm: Algorithm, secret: &[u8]) -> String {
        encode(&Header::new(algorithm), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn test_access_round_trip() {
        let service = TokenService::new(SECRET);
        let (user, session) = ids();

        let token = service
            .issue_access(&user, "alice", &session, Duration::from_secs(60))
            .unwrap();
        let claims = service.verify_access(&token).unwrap();

        assert_eq!(claims.user_id, user);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.session_id, session);
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn test_refresh_round_trip() {
        let service = TokenService::new(SECRET);
        let (user, session) = ids();

        let token = service
            .issue_refresh(&user, "alice", &session, Duration::from_secs(3600))
            .unwrap();
        let claims = service.verify_refresh(&token).unwrap();

        assert_eq!(claims.session_id, session);
        assert_eq!(claims.token_type, "refresh");
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let service = TokenService::new(SECRET);
        let (user, session) = ids();
        let access = service
            .issue_access(&user, "alice", &session, Duration::from_secs(60))
            .unwrap();
        let refresh = service
            .issue_refresh(&user, "alice", &session, Duration::from_secs(60))
            .unwrap();

        assert_eq!(service.verify_access(&refresh), Err(AuthError::WrongTokenType));
        assert_eq!(service.verify_refresh(&access), Err(AuthError::WrongTokenType));
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let issuer = TokenService::new(b"another-secret-another-secret-xx");
        let verifier = TokenService::new(SECRET);
        let (user, session) = ids();

        let token = issuer
            .issue_access(&user, "alice", &session, Duration::from_secs(60))
            .unwrap();

        assert_eq!(verifier.verify_access(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_other_algorithm_is_rejected() {
        let service = TokenService::new(SECRET);
        let (user, session) = ids();
        let claims = Claims::new(&user, "alice", &session, "access", Duration::from_secs(60));

        let token = forge(&claims, Algorithm::HS512, SECRET);

        assert_eq!(service.verify_access(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = TokenService::new(SECRET);
        let (user, session) = ids();
        let mut claims = Claims::new(&user, "alice", &session, "access", Duration::from_secs(60));
        claims.iat -= 120;
        claims.nbf -= 120;
        claims.exp = claims.iat + 60;

        let token = forge(&claims, ALGORITHM, SECRET);

        assert_eq!(service.verify_access(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_not_yet_valid_token_is_rejected() {
        let service = TokenService::new(SECRET);
        let (user, session) = ids();
        let mut claims = Claims::new(&user, "alice", &session, "access", Duration::from_secs(600));
        claims.nbf += 300;

        let token = forge(&claims, ALGORITHM, SECRET);

        assert_eq!(service.verify_access(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let service = TokenService::new(SECRET);
        let (user, session) = ids();
        let token = service
            .issue_access(&user, "alice", &session, Duration::from_secs(60))
            .unwrap();

        let mut tampered = token.clone();
        tampered.push('x');

        assert_eq!(service.verify_access(&tampered), Err(AuthError::InvalidToken));
        assert_eq!(service.verify_access("not.a.jwt"), Err(AuthError::InvalidToken));
    }
}
