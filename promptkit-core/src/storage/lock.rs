//! Per-key lock manager serializing mutations within one execution context.
//!
//! Each key gets a fair (FIFO) async mutex, created on first use and removed
//! again once the last holder or waiter is gone. Locks never leave the
//! process; two `LockManager` instances do not coordinate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::trace;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = HashMap<String, Arc<AsyncMutex<()>>>;

/// Registry of per-key async locks.
///
/// Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    entries: Arc<Mutex<Registry>>,
}

impl LockManager {
    /// Creates an empty lock manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until `key` is free and takes it.
    ///
    /// Waiters for the same key are served in arrival order. The lock is
    /// released when the returned guard is dropped, including when the
    /// holding future is cancelled or panics.
    pub async fn acquire(&self, key: &str) -> KeyLockGuard {
        let entry = Arc::clone(self.registry().entry(key.to_string()).or_default());
        trace!("waiting for lock on {key:?}");
        let guard = Arc::clone(&entry).lock_owned().await;
        trace!("acquired lock on {key:?}");
        KeyLockGuard {
            key: key.to_string(),
            guard: Some(guard),
            entry,
            manager: self.clone(),
        }
    }

    /// Number of keys with a live lock entry (held or awaited).
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.registry().len()
    }

    /// Returns `true` if `key` currently has a holder or waiter.
    #[must_use]
    pub fn is_locked(&self, key: &str) -> bool {
        self.registry().contains_key(key)
    }

    fn release(&self, key: &str, entry: &Arc<AsyncMutex<()>>) {
        let mut registry = self.registry();
        // One reference lives in the registry and one in the releasing guard;
        // anything beyond that is a waiter still holding a clone.
        let idle = registry
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, entry) && Arc::strong_count(entry) == 2);
        if idle {
            registry.remove(key);
            trace!("removed idle lock entry for {key:?}");
        }
    }
}

/// Proof that the holder owns the lock for [`KeyLockGuard::key`].
///
/// Storage mutations take a reference to a guard so they cannot run
/// unlocked.
#[derive(Debug)]
pub struct KeyLockGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    entry: Arc<AsyncMutex<()>>,
    manager: LockManager,
}

impl KeyLockGuard {
    /// The key this guard locks.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` if this guard was issued by `manager`.
    #[must_use]
    pub fn is_from(&self, manager: &LockManager) -> bool {
        Arc::ptr_eq(&self.manager.entries, &manager.entries)
    }
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        // Release the mutex first so the next waiter can proceed.
        drop(self.guard.take());
        self.manager.release(&self.key, &self.entry);
    }
}
