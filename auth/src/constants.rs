//! Store key layout.
//!
//! Every key the gateway writes to the shared store is built here so the
//! layout stays in one place.

/// Key prefixes in the shared store.
pub mod keys {
    /// `session:<session_id>` → JSON session document.
    pub const SESSION_PREFIX: &str = "session:";

    /// `user_session:<user_id>` → id of the user's canonical session.
    pub const USER_SESSION_PREFIX: &str = "user_session:";

    /// `ratelimit:<client>` → ordered set of request timestamps.
    pub const RATE_LIMIT_PREFIX: &str = "ratelimit:";

    /// `ratelimit:block:<client>` → block marker with TTL.
    pub const BLOCK_PREFIX: &str = "ratelimit:block:";

    /// Session document key.
    #[must_use]
    pub fn session(session_id: &str) -> String {
        format!("{SESSION_PREFIX}{session_id}")
    }

    /// User → canonical session index key.
    #[must_use]
    pub fn user_session(user_id: &str) -> String {
        format!("{USER_SESSION_PREFIX}{user_id}")
    }

    /// Sliding-window key for a client.
    #[must_use]
    pub fn rate_limit(client: &str) -> String {
        format!("{RATE_LIMIT_PREFIX}{client}")
    }

    /// Block marker key for a client.
    #[must_use]
    pub fn block(client: &str) -> String {
        format!("{BLOCK_PREFIX}{client}")
    }
}

/// Token type discriminators carried in the `type` claim.
pub mod token_types {
    /// Short-lived access credential.
    pub const ACCESS: &str = "access";

    /// Long-lived credential that can only mint access tokens.
    pub const REFRESH: &str = "refresh";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(keys::session("abc"), "session:abc");
        assert_eq!(keys::user_session("42"), "user_session:42");
        assert_eq!(keys::rate_limit("10.0.0.1"), "ratelimit:10.0.0.1");
        assert_eq!(keys::block("10.0.0.1"), "ratelimit:block:10.0.0.1");
    }

    #[test]
    fn test_token_type_constants() {
        assert_eq!(token_types::ACCESS, "access");
        assert_eq!(token_types::REFRESH, "refresh");
    }
}
