//! Login, refresh, admission and logout over tokens plus sessions.
//!
//! [`Gatekeeper`] knows nothing about HTTP: it takes already-extracted
//! inputs (payload, client address, raw bearer token) and returns typed
//! results, leaving status codes to the web layer.
//!
//! # Admission
//!
//! ```text
//! token ──verify──▶ claims ──get──▶ session ──user ids equal?──▶ AuthContext
//!         │                 │                 │
//!         ▼                 ▼                 ▼
//!   InvalidToken /    SessionNotFound    SessionMismatch
//!   TokenExpired /
//!   WrongTokenType
//! ```
//!
//! On success the session's `last_seen` and expiry are refreshed; a failure
//! there is logged and does not reject the request.

use crate::config::SessionConfig;
use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::state::{AuthContext, Identity, Session, SessionId, UserId};
use crate::tokens::TokenService;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Login payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    /// Caller-supplied user id.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Role tags; at least one.
    pub roles: Vec<String>,
}

impl LoginRequest {
    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` naming the problem.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty()
            || self.username.trim().is_empty()
            || self.roles.is_empty()
        {
            return Err(AuthError::InvalidRequest(
                "user_id, username and roles are required".into(),
            ));
        }

        if self.roles.iter().any(|role| role.trim().is_empty()) {
            return Err(AuthError::InvalidRequest("roles must not be blank".into()));
        }

        Ok(())
    }
}

/// Credentials handed out by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginGrant {
    /// Access token.
    pub token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// New session id.
    pub session_id: SessionId,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// User id from the request.
    pub user_id: UserId,
    /// Display name from the request.
    pub username: String,
}

/// Fresh access token minted from a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshGrant {
    /// New access token.
    pub token: String,
    /// Session the token is bound to.
    pub session_id: SessionId,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// User id from the refresh token.
    pub user_id: UserId,
    /// Display name from the refresh token.
    pub username: String,
}

/// Session-bound token admission.
#[derive(Clone)]
pub struct Gatekeeper<S> {
    sessions: S,
    tokens: TokenService,
    config: SessionConfig,
}

impl<S: SessionStore> Gatekeeper<S> {
    /// Compose a gatekeeper from its collaborators.
    pub const fn new(sessions: S, tokens: TokenService, config: SessionConfig) -> Self {
        Self {
            sessions,
            tokens,
            config,
        }
    }

    /// Session store in use.
    pub const fn sessions(&self) -> &S {
        &self.sessions
    }

    /// Token service in use.
    pub const fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Lifetimes in use.
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Log a user in, superseding any session they already had.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidRequest` for a malformed payload
    /// - `AuthError::Store` / `AuthError::Serialization` if the session cannot be written
    /// - `AuthError::Signing` if a token cannot be issued
    pub async fn login(&self, request: LoginRequest, client_ip: IpAddr) -> Result<LoginGrant> {
        request.validate()?;

        let user_id = UserId(request.user_id);
        let ttl = self.config.session_ttl;

        let session_id = SessionId::new();
        let session = Session::new(user_id.clone(), request.username, request.roles, client_ip);

        // Session write and index swap are one atomic step.
        if let Some(previous) = self.sessions.start(&session_id, &session, ttl).await? {
            self.sessions.delete(&previous).await?;
            tracing::info!(
                user_id = %user_id,
                session_id = %previous,
                "Superseded previous session"
            );
        }

        let token = self
            .tokens
            .issue_access(&user_id, &session.username, &session_id, ttl)?;
        let refresh_token = self.tokens.issue_refresh(
            &user_id,
            &session.username,
            &session_id,
            self.config.refresh_ttl,
        )?;

        tracing::info!(
            user_id = %user_id,
            session_id = %session_id,
            ip = %client_ip,
            "User logged in"
        );

        Ok(LoginGrant {
            token,
            refresh_token,
            session_id,
            expires_in: ttl.as_secs(),
            user_id,
            username: session.username,
        })
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The session is not consulted here; the next admission of the new
    /// token checks it.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` / `TokenExpired` / `WrongTokenType` for a bad token
    /// - `AuthError::Signing` if the access token cannot be issued
    pub fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant> {
        let claims = self.tokens.verify_refresh(refresh_token)?;
        let ttl = self.config.session_ttl;

        let token =
            self.tokens
                .issue_access(&claims.user_id, &claims.username, &claims.session_id, ttl)?;

        tracing::debug!(
            user_id = %claims.user_id,
            session_id = %claims.session_id,
            "Access token refreshed"
        );

        Ok(RefreshGrant {
            token,
            session_id: claims.session_id,
            expires_in: ttl.as_secs(),
            user_id: claims.user_id,
            username: claims.username,
        })
    }

    /// Admit a request carrying `access_token`.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` / `TokenExpired` / `WrongTokenType` for a bad token
    /// - `AuthError::SessionNotFound` if the session is gone
    /// - `AuthError::SessionMismatch` if the session belongs to another user
    /// - `AuthError::Store` / `AuthError::Serialization` if the session cannot be read
    pub async fn admit(&self, access_token: &str) -> Result<AuthContext> {
        let claims = self.tokens.verify_access(access_token)?;

        let session = self.sessions.get(&claims.session_id).await?;

        if session.user_id != claims.user_id {
            tracing::warn!(
                session_id = %claims.session_id,
                token_user = %claims.user_id,
                session_user = %session.user_id,
                "Token and session disagree about the user"
            );
            return Err(AuthError::SessionMismatch);
        }

        let session = match self
            .sessions
            .update(&claims.session_id, self.config.session_ttl)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(
                    session_id = %claims.session_id,
                    error = %e,
                    "Failed to refresh session"
                );
                session
            }
        };

        Ok(AuthContext {
            identity: Identity {
                user_id: claims.user_id,
                username: claims.username,
            },
            session,
            session_id: claims.session_id,
        })
    }

    /// End a session. Ending an already-ended session succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if the delete fails.
    pub async fn logout(&self, session_id: &SessionId) -> Result<()> {
        self.sessions.delete(session_id).await?;
        tracing::info!(session_id = %session_id, "User logged out");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MemoryStore;
    use crate::stores::StoreSessionStore;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn gatekeeper() -> Gatekeeper<StoreSessionStore<MemoryStore>> {
        Gatekeeper::new(
            StoreSessionStore::new(MemoryStore::new()),
            TokenService::new(b"unit-test-secret-unit-test-secret"),
            SessionConfig::new(Duration::from_secs(3600)),
        )
    }

    fn request(user_id: &str) -> LoginRequest {
        LoginRequest {
            user_id: user_id.into(),
            username: "a".into(),
            roles: vec!["USER".into()],
        }
    }

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn test_validation_requires_every_field() {
        assert!(request("1").validate().is_ok());

        for bad in [
            LoginRequest { user_id: String::new(), ..request("1") },
            LoginRequest { username: " ".into(), ..request("1") },
            LoginRequest { roles: vec![], ..request("1") },
            LoginRequest { roles: vec![String::new()], ..request("1") },
        ] {
            assert!(matches!(bad.validate(), Err(AuthError::InvalidRequest(_))));
        }
    }

    #[tokio::test]
    async fn test_login_then_admit() {
        let gk = gatekeeper();

        let grant = gk.login(request("1"), IP).await.unwrap();
        assert_eq!(grant.expires_in, 3600);
        assert!(!grant.token.is_empty());
        assert!(!grant.refresh_token.is_empty());

        let ctx = gk.admit(&grant.token).await.unwrap();
        assert_eq!(ctx.identity.user_id, UserId("1".into()));
        assert_eq!(ctx.session_id, grant.session_id);
        assert_eq!(ctx.session.ip_address, IP);
        assert!(ctx.session.has_role("USER"));
    }

    #[tokio::test]
    async fn test_second_login_supersedes_first() {
        let gk = gatekeeper();

        let first = gk.login(request("1"), IP).await.unwrap();
        let second = gk.login(request("1"), IP).await.unwrap();

        assert_ne!(first.session_id, second.session_id);
        assert_eq!(
            gk.sessions().get(&first.session_id).await,
            Err(AuthError::SessionNotFound)
        );
        assert_eq!(gk.admit(&first.token).await, Err(AuthError::SessionNotFound));
        assert!(gk.admit(&second.token).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logins_leave_one_live_session() {
        let gk = gatekeeper();
        gk.login(request("1"), IP).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gk = gk.clone();
                tokio::spawn(async move { gk.login(request("1"), IP).await })
            })
            .collect();
        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap().unwrap());
        }

        let current = gk
            .sessions()
            .current_for_user(&UserId("1".into()))
            .await
            .unwrap()
            .unwrap();
        let mut live = 0;
        for grant in &grants {
            if gk.admit(&grant.token).await.is_ok() {
                assert_eq!(grant.session_id, current);
                live += 1;
            }
        }
        assert_eq!(live, 1);
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let gk = gatekeeper();
        let grant = gk.login(request("1"), IP).await.unwrap();

        gk.logout(&grant.session_id).await.unwrap();
        gk.logout(&grant.session_id).await.unwrap();

        assert_eq!(gk.admit(&grant.token).await, Err(AuthError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let gk = gatekeeper();
        let grant = gk.login(request("1"), IP).await.unwrap();

        assert_eq!(
            gk.admit(&grant.refresh_token).await,
            Err(AuthError::WrongTokenType)
        );
        assert_eq!(
            gk.refresh(&grant.token).map(|_| ()),
            Err(AuthError::WrongTokenType)
        );
    }

    #[tokio::test]
    async fn test_refresh_mints_usable_access_token() {
        let gk = gatekeeper();
        let grant = gk.login(request("1"), IP).await.unwrap();

        let refreshed = gk.refresh(&grant.refresh_token).unwrap();
        assert_eq!(refreshed.session_id, grant.session_id);
        assert_eq!(refreshed.username, "a");

        let ctx = gk.admit(&refreshed.token).await.unwrap();
        assert_eq!(ctx.session_id, grant.session_id);
    }

    #[tokio::test]
    async fn test_session_of_other_user_is_mismatch() {
        let gk = gatekeeper();
        let grant = gk.login(request("1"), IP).await.unwrap();

        let forged = gk
            .tokens()
            .issue_access(
                &UserId("2".into()),
                "mallory",
                &grant.session_id,
                Duration::from_secs(60),
            )
            .unwrap();

        assert_eq!(gk.admit(&forged).await, Err(AuthError::SessionMismatch));
    }
}
