//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use promptkit_core::storage::{
    JsonFileStore, KeyValueStore, MemoryStore, SafeStorage, StorageConfig, StorageError,
    StorageResult,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prompt record as the extension stores it under the `prompts` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPrompt {
    pub id: String,
    pub text: String,
}

impl StoredPrompt {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Configuration with short delays so retry paths run quickly.
pub fn fast_config() -> StorageConfig {
    StorageConfig::default()
        .with_retry_delay(Duration::from_millis(1))
        .with_backup_ttl(Duration::from_millis(10))
}

pub fn memory_storage() -> (Arc<MemoryStore>, SafeStorage) {
    let store = Arc::new(MemoryStore::new());
    let storage = SafeStorage::with_config(store.clone(), fast_config());
    (store, storage)
}

pub fn file_storage(path: &Path) -> SafeStorage {
    SafeStorage::with_config(Arc::new(JsonFileStore::new(path)), fast_config())
}

/// Store wrapper whose reads can be switched to fail.
pub struct FlakyReads {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyReads {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Host("read unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FlakyReads {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn get_all(&self) -> StorageResult<Map<String, Value>> {
        self.check()?;
        self.inner.get_all().await
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.inner.set(key, value).await
    }

    async fn set_many(&self, entries: Map<String, Value>) -> StorageResult<()> {
        self.inner.set_many(entries).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.inner.remove(key).await
    }

    async fn bytes_in_use(&self) -> StorageResult<u64> {
        self.check()?;
        self.inner.bytes_in_use().await
    }
}
