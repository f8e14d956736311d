//! Session store on top of a [`SharedStore`].
//!
//! # Architecture
//!
//! Sessions are stored with:
//! - **Primary key**: `session:{session_id}` → JSON-serialized `Session`
//! - **User index**: `user_session:{user_id}` → id of the canonical session
//! - **TTL**: sliding, refreshed on every authorized request
//!
//! # Example
//!
//! ```no_run
//! use gatekeeper_auth::stores::{RedisStore, StoreSessionStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisStore::new("redis://127.0.0.1:6379").await?;
//! let sessions = StoreSessionStore::new(store);
//! # Ok(())
//! # }
//! ```

use crate::constants::keys;
use crate::error::{AuthError, Result};
use crate::providers::{Batch, Reply, SessionStore, SharedStore};
use crate::state::{Session, SessionId, UserId};
use chrono::Utc;
use std::time::Duration;

/// [`SessionStore`] backed by any [`SharedStore`].
#[derive(Clone)]
pub struct StoreSessionStore<S> {
    store: S,
}

impl<S: SharedStore> StoreSessionStore<S> {
    /// Wrap a shared store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying shared store.
    pub const fn store(&self) -> &S {
        &self.store
    }
}

impl<S: SharedStore> SessionStore for StoreSessionStore<S> {
    async fn create(&self, session_id: &SessionId, session: &Session, ttl: Duration) -> Result<()> {
        let key = keys::session(session_id.as_str());
        let payload = serde_json::to_string(session)?;

        self.store.set_ex(&key, &payload, ttl).await?;

        tracing::debug!(
            session_id = %session_id,
            user_id = %session.user_id,
            ttl_secs = ttl.as_secs(),
            "Session created"
        );

        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> Result<Session> {
        let key = keys::session(session_id.as_str());

        let payload = self
            .store
            .get(&key)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        let session: Session = serde_json::from_str(&payload)?;
        Ok(session)
    }

    async fn update(&self, session_id: &SessionId, ttl: Duration) -> Result<Session> {
        let key = keys::session(session_id.as_str());

        let mut session = self.get(session_id).await?;
        session.last_seen = Utc::now();
        let payload = serde_json::to_string(&session)?;

        // A concurrent logout between the read and this write must win.
        if !self.store.set_ex_if_exists(&key, &payload, ttl).await? {
            return Err(AuthError::SessionNotFound);
        }

        Ok(session)
    }

    async fn delete(&self, session_id: &SessionId) -> Result<()> {
        let key = keys::session(session_id.as_str());
        let removed = self.store.delete(&key).await?;

        tracing::debug!(session_id = %session_id, removed, "Session deleted");

        Ok(())
    }

    async fn current_for_user(&self, user_id: &UserId) -> Result<Option<SessionId>> {
        let key = keys::user_session(&user_id.0);
        Ok(self.store.get(&key).await?.map(SessionId))
    }

    async fn start(
        &self,
        session_id: &SessionId,
        session: &Session,
        ttl: Duration,
    ) -> Result<Option<SessionId>> {
        let payload = serde_json::to_string(session)?;
        let batch = Batch::new()
            .set(keys::session(session_id.as_str()), payload, ttl)
            .swap(keys::user_session(&session.user_id.0), session_id.as_str(), ttl);

        let replies = self.store.exec_atomic(batch).await?;
        let previous = replies
            .get(1)
            .and_then(Reply::as_str)
            .filter(|prev| *prev != session_id.as_str())
            .map(|prev| SessionId(prev.to_string()));

        tracing::debug!(
            session_id = %session_id,
            user_id = %session.user_id,
            ttl_secs = ttl.as_secs(),
            replaced = previous.is_some(),
            "Session started"
        );

        Ok(previous)
    }
}
