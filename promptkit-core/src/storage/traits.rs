//! Host key-value store interface.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::StorageResult;

/// Non-transactional host key-value store holding JSON values.
///
/// This is the only capability the storage layer needs from its platform.
/// Implementations make no atomicity promises beyond single calls and are
/// not expected to coordinate across processes.
///
/// # Implementation Notes
///
/// - `set` and `set_many` should fail with
///   [`StorageError::QuotaExceeded`](super::StorageError::QuotaExceeded)
///   (or a message containing `QUOTA_BYTES`) when the quota is exhausted.
/// - `bytes_in_use` is approximate; the storage layer only uses it for
///   usage reporting.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host read fails. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Reads several keys at once. Missing keys are omitted from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the host read fails.
    async fn get_many(&self, keys: &[&str]) -> StorageResult<Map<String, Value>> {
        let mut out = Map::new();
        for key in keys {
            if let Some(value) = self.get(key).await? {
                out.insert((*key).to_string(), value);
            }
        }
        Ok(out)
    }

    /// Reads every key in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the host read fails.
    async fn get_all(&self) -> StorageResult<Map<String, Value>>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host write fails.
    async fn set(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Stores several entries in one host call.
    ///
    /// # Errors
    ///
    /// Returns an error if the host write fails.
    async fn set_many(&self, entries: Map<String, Value>) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the host write fails.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Approximate number of bytes used by all entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot report usage.
    async fn bytes_in_use(&self) -> StorageResult<u64>;
}

/// Approximate footprint of one entry: key length plus serialized JSON length.
///
/// # Panics
///
/// Never: serializing a `serde_json::Value` cannot fail.
#[must_use]
pub fn entry_size(key: &str, value: &Value) -> u64 {
    let value_len = serde_json::to_string(value).map_or(0, |json| json.len());
    (key.len() + value_len) as u64
}
