//! Admission state types.
//!
//! This module defines the identifiers, the server-side session record and
//! the typed request-scoped carrier that flows from admission to handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Identifier of a user, as supplied by the login caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a session.
///
/// Independent of the user id so that knowing a user id never lets a
/// caller guess the session key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random `SessionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════

/// One authenticated login.
///
/// Stored as a JSON document under `session:<session_id>` with a sliding
/// expiry. At most one session per user is canonical; a new login deletes
/// the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// User this session belongs to.
    pub user_id: UserId,

    /// Display name captured at login.
    pub username: String,

    /// Role tags (never empty).
    pub roles: Vec<String>,

    /// When the session was created.
    pub login_time: DateTime<Utc>,

    /// Last authorized request seen on this session.
    pub last_seen: DateTime<Utc>,

    /// Address the login came from.
    pub ip_address: IpAddr,
}

impl Session {
    /// Create a fresh session stamped with the current time.
    #[must_use]
    pub fn new(user_id: UserId, username: String, roles: Vec<String>, ip_address: IpAddr) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            username,
            roles,
            login_time: now,
            last_seen: now,
            ip_address,
        }
    }

    /// Whether the session carries the given role tag.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Request-scoped identity
// ═══════════════════════════════════════════════════════════════════════

/// Verified identity taken from an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// User id from the token (equal to the session's user id).
    pub user_id: UserId,
    /// Display name from the token.
    pub username: String,
}

/// Everything admission established about an authorized request.
///
/// Inserted once into the request extensions by the admission middleware
/// and read back by handlers through a typed extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Identity asserted by the verified token.
    pub identity: Identity,
    /// Session record loaded from the store.
    pub session: Session,
    /// Id of the loaded session.
    pub session_id: SessionId,
}
