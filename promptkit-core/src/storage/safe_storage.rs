//! Locked storage facade: typed reads and writes, atomic updates, bulk
//! export/import and usage reporting.

use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::config::StorageConfig;
use super::error::{StorageError, StorageResult, WriteFailure, WriteResult};
use super::lock::LockManager;
use super::traits::KeyValueStore;
use super::writer::{VerifiedWriter, WriteOptions, WriteReport};

/// Storage usage snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageStats {
    /// Bytes reported in use by the host store.
    pub bytes_used: u64,
    /// Configured quota.
    pub bytes_total: u64,
    /// `bytes_used / bytes_total` as a percentage.
    pub percent_used: f64,
}

/// Verified, lock-serialized access to a host key-value store.
///
/// Every mutation takes the per-key lock of the owned [`LockManager`], so
/// same-key operations through one `SafeStorage` (or its clones) never
/// interleave. Separately constructed instances do not coordinate.
#[derive(Debug, Clone)]
pub struct SafeStorage {
    writer: VerifiedWriter,
    locks: LockManager,
}

impl SafeStorage {
    /// Wraps `store` with the default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, StorageConfig::default())
    }

    /// Wraps `store` with `config`.
    #[must_use]
    pub fn with_config(store: Arc<dyn KeyValueStore>, config: StorageConfig) -> Self {
        let locks = LockManager::new();
        Self {
            writer: VerifiedWriter::new(store, Arc::new(config), locks.clone()),
            locks,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        self.writer.config()
    }

    /// The lock manager serializing this instance's mutations.
    #[must_use]
    pub const fn locks(&self) -> &LockManager {
        &self.locks
    }

    // =========================================================================
    // Reads and writes
    // =========================================================================

    /// Reads the raw JSON value of `key`. Host failures read as absent.
    pub async fn read_value(&self, key: &str) -> Option<Value> {
        self.writer.read(key).await
    }

    /// Reads `key` as `T`.
    ///
    /// Host failures and values of the wrong shape read as absent; the
    /// latter is logged.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.writer.read(key).await?;
        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("stored value of {key:?} has an unexpected shape: {err}");
                None
            }
        }
    }

    /// Writes `value` under `key` with default options and returns it.
    ///
    /// # Errors
    ///
    /// See [`VerifiedWriter::write`].
    pub async fn write<T: Serialize>(&self, key: &str, value: T) -> WriteResult<T> {
        self.write_with(key, &value, WriteOptions::default())
            .await
            .map(|_| value)
    }

    /// Writes `value` under `key` with explicit options.
    ///
    /// # Errors
    ///
    /// Returns a serialization failure without touching the store, or any
    /// failure from [`VerifiedWriter::write`].
    pub async fn write_with<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: WriteOptions,
    ) -> WriteResult<WriteReport> {
        let value = serde_json::to_value(value).map_err(|e| WriteFailure::new(e.into()))?;
        let guard = self.locks.acquire(key).await;
        let report = self.writer.write(&guard, key, &value, options).await?;
        drop(guard);
        if report.backup_taken {
            self.schedule_backup_cleanup(key);
        }
        Ok(report)
    }

    /// Removes `key` under its lock. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns the host failure, if any.
    pub async fn remove(&self, key: &str) -> WriteResult<()> {
        let _guard = self.locks.acquire(key).await;
        self.writer.store().remove(key).await.map_err(WriteFailure::new)
    }

    // =========================================================================
    // Atomic updates
    // =========================================================================

    /// Reads, transforms and writes `key` while holding its lock.
    ///
    /// The updater receives the current value (or `None`) and returns the
    /// new one, which is written with backup and verification. Returns the
    /// new value.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Serialization`] if the stored value cannot be
    ///   decoded as `T`; nothing is written in that case.
    /// - Any failure from [`VerifiedWriter::write`].
    pub async fn atomic_update<T, F, Fut>(&self, key: &str, updater: F) -> WriteResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> Fut,
        Fut: Future<Output = T>,
    {
        self.try_atomic_update(key, |current| async move {
            Ok::<T, Infallible>(updater(current).await)
        })
        .await
    }

    /// Like [`SafeStorage::atomic_update`], but the updater may fail.
    ///
    /// # Errors
    ///
    /// An updater error aborts without writing and is returned as
    /// [`StorageError::Updater`]. Other failures as in
    /// [`SafeStorage::atomic_update`].
    pub async fn try_atomic_update<T, E, F, Fut>(&self, key: &str, updater: F) -> WriteResult<T>
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        F: FnOnce(Option<T>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = self.locks.acquire(key).await;

        let current = match self.writer.read(key).await {
            Some(value) => Some(serde_json::from_value::<T>(value).map_err(|err| {
                error!("refusing to update {key:?}: stored value does not decode: {err}");
                WriteFailure::new(err.into())
            })?),
            None => None,
        };

        let next = updater(current).await.map_err(|err| {
            debug!("updater for {key:?} aborted");
            WriteFailure::new(StorageError::Updater(err.to_string()))
        })?;
        let value = serde_json::to_value(&next).map_err(|e| WriteFailure::new(e.into()))?;

        let report = self
            .writer
            .write(&guard, key, &value, WriteOptions::durable())
            .await?;
        drop(guard);

        if report.backup_taken {
            self.schedule_backup_cleanup(key);
        }
        Ok(next)
    }

    // =========================================================================
    // Usage
    // =========================================================================

    /// Reports bytes used against the configured quota.
    ///
    /// # Errors
    ///
    /// Returns the host failure if usage cannot be read.
    pub async fn stats(&self) -> StorageResult<StorageStats> {
        let bytes_used = self.writer.store().bytes_in_use().await?;
        let bytes_total = self.config().quota_bytes;
        #[allow(clippy::cast_precision_loss)]
        let percent_used = if bytes_total == 0 {
            100.0
        } else {
            bytes_used as f64 / bytes_total as f64 * 100.0
        };
        Ok(StorageStats {
            bytes_used,
            bytes_total,
            percent_used,
        })
    }

    /// Returns `true` once usage reaches the configured threshold.
    ///
    /// Unknown usage is reported as not low.
    pub async fn is_storage_low(&self) -> bool {
        match self.stats().await {
            Ok(stats) => stats.percent_used >= self.config().low_storage_threshold_percent,
            Err(err) => {
                warn!("could not read storage usage: {err}");
                false
            }
        }
    }

    // =========================================================================
    // Bulk export / import
    // =========================================================================

    /// Returns every stored entry except backup slots.
    ///
    /// # Errors
    ///
    /// Returns the host failure if the store cannot be listed.
    pub async fn export_all(&self) -> StorageResult<Map<String, Value>> {
        let mut entries = self.writer.store().get_all().await?;
        entries.retain(|key, _| !self.config().is_backup_key(key));
        Ok(entries)
    }

    /// Writes every entry of `entries` in one host call.
    ///
    /// Locks for all keys are taken in sorted order before writing. Entries
    /// named like backup slots are dropped. Returns the number of keys
    /// written.
    ///
    /// # Errors
    ///
    /// Returns the host failure; the store may then hold any subset of the
    /// entries.
    pub async fn import_all(&self, mut entries: Map<String, Value>) -> WriteResult<usize> {
        entries.retain(|key, _| {
            let keep = !self.config().is_backup_key(key);
            if !keep {
                debug!("skipping backup slot {key:?} on import");
            }
            keep
        });

        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.locks.acquire(key).await);
        }

        let count = entries.len();
        self.writer
            .store()
            .set_many(entries)
            .await
            .map_err(|err| {
                if err.is_quota_exceeded() {
                    WriteFailure::new(StorageError::QuotaExceeded)
                } else {
                    WriteFailure::new(err)
                }
            })?;
        drop(guards);
        Ok(count)
    }

    // =========================================================================
    // Backup cleanup
    // =========================================================================

    /// Removes the backup slot of `key` after the configured delay.
    ///
    /// Runs on the ambient tokio runtime and takes the key lock, so it never
    /// races a write in progress. Without a runtime the slot is left for the
    /// next write to overwrite.
    fn schedule_backup_cleanup(&self, key: &str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime; leaving backup of {key:?} in place");
            return;
        };
        let this = self.clone();
        let key = key.to_string();
        let ttl = this.config().backup_ttl;
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            let guard = this.locks.acquire(&key).await;
            if let Err(err) = this.writer.remove_backup(&guard, &key).await {
                warn!("failed to clean up backup of {key:?}: {err}");
            }
        });
    }
}
