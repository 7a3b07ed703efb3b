//! In-memory host store for tests and embedding.
//!
//! Besides plain storage it can enforce a byte quota and inject faults
//! (corrupted or failing writes, failing removals) so the verified writer's retry and
//! rollback paths can be exercised deterministically.

#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::error::{StorageError, StorageResult};
use super::traits::{entry_size, KeyValueStore};

// =============================================================================
// Fault injection
// =============================================================================

#[derive(Debug, Clone)]
enum Fault {
    /// Store a different value than requested.
    Corrupt,
    /// Reject the write with a host error carrying this message.
    Fail(String),
}

#[derive(Debug, Default)]
struct Inner {
    entries: Map<String, Value>,
    faults: HashMap<String, Vec<Fault>>,
    remove_faults: HashMap<String, Vec<String>>,
    set_counts: HashMap<String, u32>,
}

impl Inner {
    fn used_bytes(&self) -> u64 {
        self.entries.iter().map(|(k, v)| entry_size(k, v)).sum()
    }

    fn next_fault(&mut self, key: &str) -> Option<Fault> {
        let queue = self.faults.get_mut(key)?;
        if queue.is_empty() {
            return None;
        }
        Some(queue.remove(0))
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory [`KeyValueStore`] backed by a JSON map.
///
/// Thread-safe; every call takes a short internal lock, so individual calls
/// are atomic but sequences of calls are not.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    quota_bytes: Option<u64>,
}

impl MemoryStore {
    /// Creates an empty store without a quota.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that rejects writes growing it past `quota_bytes`.
    #[must_use]
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            inner: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next `count` writes to `key` store a corrupted value.
    ///
    /// Verification will see a mismatch on read-back.
    pub fn corrupt_next_sets(&self, key: &str, count: usize) {
        self.lock()
            .faults
            .entry(key.to_string())
            .or_default()
            .extend((0..count).map(|_| Fault::Corrupt));
    }

    /// Makes the next `count` writes to `key` fail with a host error.
    pub fn fail_next_sets(&self, key: &str, count: usize, message: &str) {
        self.lock()
            .faults
            .entry(key.to_string())
            .or_default()
            .extend((0..count).map(|_| Fault::Fail(message.to_string())));
    }

    /// Makes the next `count` removals of `key` fail with a host error.
    pub fn fail_next_removes(&self, key: &str, count: usize, message: &str) {
        self.lock()
            .remove_faults
            .entry(key.to_string())
            .or_default()
            .extend((0..count).map(|_| message.to_string()));
    }

    /// Number of `set` calls that reached `key`, including faulted ones.
    #[must_use]
    pub fn set_count(&self, key: &str) -> u32 {
        self.lock().set_counts.get(key).copied().unwrap_or(0)
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Returns all stored keys, including backup slots.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    fn check_quota(&self, inner: &Inner, incoming: &Map<String, Value>) -> StorageResult<()> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };
        let replaced: u64 = incoming
            .keys()
            .filter_map(|k| inner.entries.get(k).map(|v| entry_size(k, v)))
            .sum();
        let added: u64 = incoming.iter().map(|(k, v)| entry_size(k, v)).sum();
        if inner.used_bytes() - replaced + added > quota {
            return Err(StorageError::QuotaExceeded);
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.lock().entries.get(key).cloned())
    }

    async fn get_all(&self) -> StorageResult<Map<String, Value>> {
        Ok(self.lock().entries.clone())
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let mut inner = self.lock();
        *inner.set_counts.entry(key.to_string()).or_default() += 1;

        let value = match inner.next_fault(key) {
            Some(Fault::Fail(message)) => return Err(StorageError::Host(message)),
            Some(Fault::Corrupt) => json!({ "__corrupted__": true }),
            None => value,
        };

        let mut incoming = Map::new();
        incoming.insert(key.to_string(), value);
        self.check_quota(&inner, &incoming)?;
        inner.entries.extend(incoming);
        Ok(())
    }

    async fn set_many(&self, entries: Map<String, Value>) -> StorageResult<()> {
        let mut inner = self.lock();
        self.check_quota(&inner, &entries)?;
        for key in entries.keys() {
            *inner.set_counts.entry(key.clone()).or_default() += 1;
        }
        inner.entries.extend(entries);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let mut inner = self.lock();
        if let Some(queue) = inner.remove_faults.get_mut(key) {
            if !queue.is_empty() {
                return Err(StorageError::Host(queue.remove(0)));
            }
        }
        inner.entries.remove(key);
        Ok(())
    }

    async fn bytes_in_use(&self) -> StorageResult<u64> {
        Ok(self.lock().used_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set("a", json!([1, 2])).await.unwrap();
        store.set("b", json!({"x": true})).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!([1, 2])));
        assert_eq!(store.len(), 2);

        let many = store.get_many(&["a", "missing"]).await.unwrap();
        assert_eq!(many.len(), 1);

        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.set_count("a"), 1);
    }

    #[tokio::test]
    async fn test_quota_enforced() {
        let store = MemoryStore::with_quota(20);
        store.set("k", json!("0123456789")).await.unwrap();
        let err = store.set("k2", json!("0123456789")).await.unwrap_err();
        assert!(err.is_quota_exceeded());

        // Replacing an entry only counts the difference.
        store.set("k", json!("9876543210")).await.unwrap();
        assert_eq!(store.bytes_in_use().await.unwrap(), 1 + 12);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryStore::new();
        store.fail_next_sets("k", 1, "disk unavailable");
        store.corrupt_next_sets("k", 1);

        let err = store.set("k", json!(1)).await.unwrap_err();
        assert_eq!(err, StorageError::Host("disk unavailable".to_string()));

        store.set("k", json!(2)).await.unwrap();
        assert_ne!(store.get("k").await.unwrap(), Some(json!(2)));

        store.set("k", json!(3)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(3)));
        assert_eq!(store.set_count("k"), 3);
    }
}
