//! Shared state store trait.
//!
//! The gateway keeps all mutable state (sessions, rate-limit windows, block
//! markers) in an external key-value service. Components receive the store
//! as an injected dependency; nothing reaches for a process-global handle.

use crate::error::Result;
use std::time::Duration;

/// One command inside an atomic [`Batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `SET key value PX ttl`
    Set {
        /// Key to write.
        key: String,
        /// Value to store.
        value: String,
        /// Expiry of the key.
        ttl: Duration,
    },
    /// `SET key value PX ttl GET`: write and return the previous value.
    Swap {
        /// Key to write.
        key: String,
        /// Value to store.
        value: String,
        /// Expiry of the key.
        ttl: Duration,
    },
    /// `DEL key`
    Delete {
        /// Key to remove.
        key: String,
    },
    /// `ZREMRANGEBYSCORE key min max`
    ZRemRangeByScore {
        /// Ordered-set key.
        key: String,
        /// Lowest score removed (inclusive).
        min: f64,
        /// Highest score removed (inclusive).
        max: f64,
    },
    /// `ZCARD key`
    ZCard {
        /// Ordered-set key.
        key: String,
    },
    /// `ZADD key score member`
    ZAdd {
        /// Ordered-set key.
        key: String,
        /// Score of the new member.
        score: f64,
        /// Member name.
        member: String,
    },
    /// `PEXPIRE key ttl`
    PExpire {
        /// Key whose expiry is refreshed.
        key: String,
        /// New expiry.
        ttl: Duration,
    },
}

/// Reply to a single [`Command`], in batch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Status reply (`OK`).
    Ok,
    /// Integer reply (counts, cardinalities, flags).
    Int(i64),
    /// Null reply.
    Nil,
    /// String reply.
    Value(String),
}

impl Reply {
    /// Integer payload of the reply, if any.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Ok | Self::Nil | Self::Value(_) => None,
        }
    }

    /// String payload of the reply, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(s) => Some(s),
            Self::Ok | Self::Nil | Self::Int(_) => None,
        }
    }
}

/// A list of commands executed as one atomic unit in a single round trip.
///
/// # Example
///
/// ```
/// use gatekeeper_auth::providers::Batch;
/// use std::time::Duration;
///
/// let batch = Batch::new()
///     .zrem_range_by_score("ratelimit:10.0.0.1", 0.0, 1_000.0)
///     .zcard("ratelimit:10.0.0.1")
///     .pexpire("ratelimit:10.0.0.1", Duration::from_secs(120));
/// assert_eq!(batch.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    /// Create an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Append `SET key value PX ttl`.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value: value.into(),
            ttl,
        });
        self
    }

    /// Append `SET key value PX ttl GET`; its reply is the value it replaced.
    #[must_use]
    pub fn swap(mut self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> Self {
        self.commands.push(Command::Swap {
            key: key.into(),
            value: value.into(),
            ttl,
        });
        self
    }

    /// Append `DEL key`.
    #[must_use]
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.commands.push(Command::Delete { key: key.into() });
        self
    }

    /// Append `ZREMRANGEBYSCORE key min max`.
    #[must_use]
    pub fn zrem_range_by_score(mut self, key: impl Into<String>, min: f64, max: f64) -> Self {
        self.commands.push(Command::ZRemRangeByScore {
            key: key.into(),
            min,
            max,
        });
        self
    }

    /// Append `ZCARD key`.
    #[must_use]
    pub fn zcard(mut self, key: impl Into<String>) -> Self {
        self.commands.push(Command::ZCard { key: key.into() });
        self
    }

    /// Append `ZADD key score member`.
    #[must_use]
    pub fn zadd(mut self, key: impl Into<String>, score: f64, member: impl Into<String>) -> Self {
        self.commands.push(Command::ZAdd {
            key: key.into(),
            score,
            member: member.into(),
        });
        self
    }

    /// Append `PEXPIRE key ttl`.
    #[must_use]
    pub fn pexpire(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.commands.push(Command::PExpire {
            key: key.into(),
            ttl,
        });
        self
    }

    /// Commands in execution order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the batch has no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Shared key-value store with expiry, ordered sets and atomic batches.
///
/// # Implementation Notes
///
/// - Implementations must be safe for concurrent use from many tasks
///   without external locking (clone the handle per task).
/// - Every method is a suspension point; failures map to `AuthError::Store`.
pub trait SharedStore: Clone + Send + Sync + 'static {
    /// Check that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns error if the store does not answer.
    fn ping(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Read a string value.
    ///
    /// # Returns
    ///
    /// `None` if the key is missing or expired.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn get(&self, key: &str) -> impl std::future::Future<Output = Result<Option<String>>> + Send;

    /// Write a string value with an expiry.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Overwrite a value only if the key still exists, atomically.
    ///
    /// # Returns
    ///
    /// `true` if the value was written, `false` if the key was absent.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn set_ex_if_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Delete a key.
    ///
    /// # Returns
    ///
    /// `true` if a key was removed. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn delete(&self, key: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Check whether a key exists.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn exists(&self, key: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Lowest-scored member of an ordered set, with its score.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn oldest(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<(String, f64)>>> + Send;

    /// Execute a batch atomically in one round trip.
    ///
    /// # Returns
    ///
    /// One [`Reply`] per command, in order.
    ///
    /// # Errors
    ///
    /// Returns error if the batch fails; no reply is returned then.
    fn exec_atomic(
        &self,
        batch: Batch,
    ) -> impl std::future::Future<Output = Result<Vec<Reply>>> + Send;
}
