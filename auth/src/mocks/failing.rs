//! Fault-injecting shared store for testing degraded paths.

use super::MemoryStore;
use crate::error::{AuthError, Result};
use crate::providers::{Batch, Reply, SharedStore};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Operation class that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `ping`
    Ping,
    /// `get`
    Get,
    /// `set_ex` and `set_ex_if_exists`
    Set,
    /// `delete`
    Delete,
    /// `exists` (block checks)
    Exists,
    /// `oldest`
    Oldest,
    /// `exec_atomic` (rate-limit counting, session start)
    Batch,
}

/// [`MemoryStore`] wrapper that fails selected operations.
///
/// # Example
///
/// ```
/// use gatekeeper_auth::mocks::{FailingStore, Fault};
///
/// let store = FailingStore::new().failing(Fault::Batch);
/// assert!(store.is_failing(Fault::Batch));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    faults: Arc<Mutex<HashSet<Fault>>>,
}

impl FailingStore {
    /// Create a store with no faults armed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fault (builder form).
    #[must_use]
    pub fn failing(self, fault: Fault) -> Self {
        self.set_fault(fault, true);
        self
    }

    /// Arm or disarm a fault at runtime.
    pub fn set_fault(&self, fault: Fault, armed: bool) {
        if let Ok(mut faults) = self.faults.lock() {
            if armed {
                faults.insert(fault);
            } else {
                faults.remove(&fault);
            }
        }
    }

    /// Whether a fault is armed.
    #[must_use]
    pub fn is_failing(&self, fault: Fault) -> bool {
        self.faults.lock().is_ok_and(|f| f.contains(&fault))
    }

    /// The healthy store underneath, for seeding and inspection.
    #[must_use]
    pub const fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn guard(&self, fault: Fault) -> Result<()> {
        if self.is_failing(fault) {
            return Err(AuthError::Store(format!("injected {fault:?} failure")));
        }
        Ok(())
    }
}

impl SharedStore for FailingStore {
    async fn ping(&self) -> Result<()> {
        self.guard(Fault::Ping)?;
        self.inner.ping().await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.guard(Fault::Get)?;
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.guard(Fault::Set)?;
        self.inner.set_ex(key, value, ttl).await
    }

    async fn set_ex_if_exists(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.guard(Fault::Set)?;
        self.inner.set_ex_if_exists(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.guard(Fault::Delete)?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.guard(Fault::Exists)?;
        self.inner.exists(key).await
    }

    async fn oldest(&self, key: &str) -> Result<Option<(String, f64)>> {
        self.guard(Fault::Oldest)?;
        self.inner.oldest(key).await
    }

    async fn exec_atomic(&self, batch: Batch) -> Result<Vec<Reply>> {
        self.guard(Fault::Batch)?;
        self.inner.exec_atomic(batch).await
    }
}
