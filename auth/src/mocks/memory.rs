//! In-memory shared store for testing.

use crate::error::{AuthError, Result};
use crate::providers::{Batch, Command, Reply, SharedStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    /// Ordered-set members sorted by `(score, member)`.
    ZSet(Vec<(f64, String)>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
}

impl Inner {
    fn purge(&mut self, key: &str, now: Instant) {
        if self.entries.get(key).is_some_and(|e| !e.is_live(now)) {
            self.entries.remove(key);
        }
    }

    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        self.purge(key, now);
        self.entries.get_mut(key)
    }

    fn zset(&mut self, key: &str, now: Instant) -> Option<&mut Vec<(f64, String)>> {
        match self.live(key, now) {
            Some(Entry {
                value: Value::ZSet(members),
                ..
            }) => Some(members),
            _ => None,
        }
    }

    fn apply(&mut self, command: &Command, now: Instant) -> Reply {
        match command {
            Command::Set { key, value, ttl } => {
                self.entries.insert(
                    key.clone(),
                    Entry {
                        value: Value::Str(value.clone()),
                        expires_at: Some(now + *ttl),
                    },
                );
                Reply::Ok
            }
            Command::Swap { key, value, ttl } => {
                self.purge(key, now);
                let previous = self.entries.insert(
                    key.clone(),
                    Entry {
                        value: Value::Str(value.clone()),
                        expires_at: Some(now + *ttl),
                    },
                );
                match previous {
                    Some(Entry {
                        value: Value::Str(old),
                        ..
                    }) => Reply::Value(old),
                    _ => Reply::Nil,
                }
            }
            Command::Delete { key } => {
                self.purge(key, now);
                Reply::Int(i64::from(self.entries.remove(key).is_some()))
            }
            Command::ZRemRangeByScore { key, min, max } => {
                let Some(members) = self.zset(key, now) else {
                    return Reply::Int(0);
                };
                let before = members.len();
                members.retain(|(score, _)| *score < *min || *score > *max);
                let removed = before - members.len();
                if members.is_empty() {
                    self.entries.remove(key);
                }
                Reply::Int(i64::try_from(removed).unwrap_or(i64::MAX))
            }
            Command::ZCard { key } => {
                let count = self.zset(key, now).map_or(0, |m| m.len());
                Reply::Int(i64::try_from(count).unwrap_or(i64::MAX))
            }
            Command::ZAdd { key, score, member } => {
                if self.zset(key, now).is_none() {
                    self.entries.insert(
                        key.clone(),
                        Entry {
                            value: Value::ZSet(Vec::new()),
                            expires_at: None,
                        },
                    );
                }
                let Some(members) = self.zset(key, now) else {
                    return Reply::Int(0);
                };
                let added = if let Some(existing) = members.iter_mut().find(|(_, m)| m == member) {
                    existing.0 = *score;
                    0
                } else {
                    members.push((*score, member.clone()));
                    1
                };
                members.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
                Reply::Int(added)
            }
            Command::PExpire { key, ttl } => match self.live(key, now) {
                Some(entry) => {
                    entry.expires_at = Some(now + *ttl);
                    Reply::Int(1)
                }
                None => Reply::Int(0),
            },
        }
    }
}

/// In-memory [`SharedStore`] with TTL emulation.
///
/// Every operation (and every batch) runs under one lock, which gives the
/// same atomicity a `MULTI`/`EXEC` pipeline gives against Redis.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AuthError::Store("Mutex lock failed".to_string()))
    }

    /// Remaining time to live of a key (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        let mut inner = self.lock()?;
        Ok(inner
            .live(key, now)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    /// Number of live keys (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn key_count(&self) -> Result<usize> {
        let now = Instant::now();
        let inner = self.lock()?;
        Ok(inner.entries.values().filter(|e| e.is_live(now)).count())
    }
}

impl SharedStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut inner = self.lock()?;
        match inner.live(key, now) {
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(AuthError::Store(
                "WRONGTYPE Operation against a key holding the wrong kind of value".into(),
            )),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let command = Command::Set {
            key: key.to_string(),
            value: value.to_string(),
            ttl,
        };
        self.lock()?.apply(&command, Instant::now());
        Ok(())
    }

    async fn set_ex_if_exists(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut inner = self.lock()?;
        let Some(entry) = inner.live(key, now) else {
            return Ok(false);
        };
        entry.value = Value::Str(value.to_string());
        entry.expires_at = Some(now + ttl);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let command = Command::Delete {
            key: key.to_string(),
        };
        let reply = self.lock()?.apply(&command, Instant::now());
        Ok(reply == Reply::Int(1))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self.lock()?.live(key, now).is_some())
    }

    async fn oldest(&self, key: &str) -> Result<Option<(String, f64)>> {
        let now = Instant::now();
        let mut inner = self.lock()?;
        Ok(inner
            .zset(key, now)
            .and_then(|members| members.first())
            .map(|(score, member)| (member.clone(), *score)))
    }

    async fn exec_atomic(&self, batch: Batch) -> Result<Vec<Reply>> {
        let now = Instant::now();
        let mut inner = self.lock()?;
        Ok(batch
            .commands()
            .iter()
            .map(|command| inner.apply(command, now))
            .collect())
    }
}
