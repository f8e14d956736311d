//! Session store trait.

use crate::error::Result;
use crate::state::{Session, SessionId, UserId};
use std::time::Duration;

/// Session store.
///
/// This trait abstracts over session storage in the shared state store.
///
/// # Implementation Notes
///
/// - Sessions are ephemeral (24-hour TTL by default)
/// - Sliding expiration on each authorized request
/// - `get` on a missing key is `AuthError::SessionNotFound`, never a generic error
pub trait SessionStore: Send + Sync {
    /// Create (or overwrite) a session.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation or serialization fails.
    fn create(
        &self,
        session_id: &SessionId,
        session: &Session,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Get a session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Session missing or expired → `AuthError::SessionNotFound`
    /// - Store operation fails → `AuthError::Store`
    fn get(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Session>> + Send;

    /// Stamp `last_seen = now` and extend the expiry to `ttl`.
    ///
    /// # Returns
    ///
    /// The refreshed session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Session missing, or deleted while the update was in flight → `AuthError::SessionNotFound`
    /// - Store operation fails → `AuthError::Store`
    fn update(
        &self,
        session_id: &SessionId,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<Session>> + Send;

    /// Delete a session. Deleting a missing session succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn delete(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Current canonical session id of a user, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn current_for_user(
        &self,
        user_id: &UserId,
    ) -> impl std::future::Future<Output = Result<Option<SessionId>>> + Send;

    /// Write a new session and make it the user's canonical one, atomically.
    ///
    /// # Returns
    ///
    /// The session id the index pointed to before, if any. The caller
    /// deletes it; concurrent starts each get back the id they displaced,
    /// so every superseded session is deleted by exactly one of them.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation or serialization fails.
    fn start(
        &self,
        session_id: &SessionId,
        session: &Session,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<Option<SessionId>>> + Send;
}
