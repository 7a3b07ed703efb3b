//! Verified writes with backup and rollback on top of a plain host store.
//!
//! A write proceeds in four steps:
//!
//! ```text
//! backup (optional) ─ set ─ read back ─┬─ equal ───────────── Ok
//!                     ▲                ├─ quota error ─────── Err (rollback if touched)
//!                     └─ sleep(n*d) ───┴─ mismatch / error ── retry, then rollback
//! ```
//!
//! Rollback only trusts state captured during the same write: the backup
//! slot it just filled, or the knowledge that the key was absent. A backup
//! slot left over from an earlier write is never restored.
//!
//! A quota error is never retried. It only triggers rollback when an
//! earlier attempt already reached the store.

use std::sync::Arc;

use log::{debug, error, info, warn};
use serde_json::Value;

use super::config::StorageConfig;
use super::error::{StorageError, WriteFailure, WriteResult};
use super::lock::{KeyLockGuard, LockManager};
use super::traits::KeyValueStore;

/// Per-write options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Whether to back up the previous value first.
    ///
    /// `None` backs up collection-like values (JSON arrays) only.
    pub backup: Option<bool>,
    /// Whether to read the value back and compare after writing.
    pub verify: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            backup: None,
            verify: true,
        }
    }
}

impl WriteOptions {
    /// Backup and verification both forced on.
    #[must_use]
    pub const fn durable() -> Self {
        Self {
            backup: Some(true),
            verify: true,
        }
    }

    /// Neither backup nor verification.
    #[must_use]
    pub const fn unchecked() -> Self {
        Self {
            backup: Some(false),
            verify: false,
        }
    }

    fn wants_backup(self, value: &Value) -> bool {
        self.backup.unwrap_or_else(|| value.is_array())
    }
}

/// Outcome of a successful verified write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Whether the previous value was copied to the backup slot.
    pub backup_taken: bool,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// What the writer knows about the key's state before the write.
#[derive(Debug)]
enum Prior {
    /// No backup requested; nothing known.
    Skipped,
    /// The key did not exist.
    Absent,
    /// The previous value, and whether it also reached the backup slot.
    Present { value: Value, persisted: bool },
    /// The previous value could not be read.
    Unknown,
}

/// Host-store writer adding backup, verification, retries and rollback.
///
/// Mutations only accept guards issued by the writer's own
/// [`LockManager`]. Cloning is cheap and shares the store and the locks.
#[derive(Clone)]
pub struct VerifiedWriter {
    store: Arc<dyn KeyValueStore>,
    config: Arc<StorageConfig>,
    locks: LockManager,
}

impl std::fmt::Debug for VerifiedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifiedWriter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VerifiedWriter {
    /// Wraps `store` using `config`. Writes must hold a lock from `locks`.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: Arc<StorageConfig>,
        locks: LockManager,
    ) -> Self {
        Self {
            store,
            config,
            locks,
        }
    }

    /// The lock manager whose guards this writer accepts.
    #[must_use]
    pub const fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// The underlying host store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Reads `key`, treating any host failure as absence.
    pub async fn read(&self, key: &str) -> Option<Value> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(err) => {
                error!("read of {key:?} failed: {err}");
                None
            }
        }
    }

    fn check_lock(&self, lock: &KeyLockGuard, key: &str) -> Result<(), StorageError> {
        if lock.key() == key && lock.is_from(&self.locks) {
            return Ok(());
        }
        Err(StorageError::LockMismatch {
            key: key.to_string(),
            held: lock.key().to_string(),
        })
    }

    /// Writes `value` under `key` while `lock` is held for that key.
    ///
    /// # Errors
    ///
    /// Returns a [`WriteFailure`] if the write could not be confirmed. Its
    /// `recovered_from_backup` flag is set only when the key's prior state
    /// was restored and confirmed by read-back. A guard for another key or
    /// from another [`LockManager`] fails with
    /// [`StorageError::LockMismatch`] before the store is touched.
    pub async fn write(
        &self,
        lock: &KeyLockGuard,
        key: &str,
        value: &Value,
        options: WriteOptions,
    ) -> WriteResult<WriteReport> {
        self.check_lock(lock, key).map_err(WriteFailure::new)?;

        let prior = if options.wants_backup(value) {
            self.take_backup(key).await
        } else {
            Prior::Skipped
        };
        let backup_taken = matches!(prior, Prior::Present { persisted: true, .. });

        let max_attempts = self.config.max_retries.max(1);
        let mut last_error = StorageError::VerificationFailed {
            key: key.to_string(),
            attempts: 0,
        };

        for attempt in 1..=max_attempts {
            match self.store.set(key, value.clone()).await {
                Ok(()) if !options.verify => {
                    return Ok(WriteReport {
                        backup_taken,
                        attempts: attempt,
                    });
                }
                Ok(()) => match self.store.get(key).await {
                    Ok(Some(stored)) if stored == *value => {
                        debug!("write to {key:?} verified on attempt {attempt}");
                        return Ok(WriteReport {
                            backup_taken,
                            attempts: attempt,
                        });
                    }
                    Ok(_) => {
                        warn!("verification of {key:?} failed on attempt {attempt}");
                        last_error = StorageError::VerificationFailed {
                            key: key.to_string(),
                            attempts: attempt,
                        };
                    }
                    Err(err) => {
                        warn!("read-back of {key:?} failed on attempt {attempt}: {err}");
                        last_error = err;
                    }
                },
                Err(err) if err.is_quota_exceeded() => {
                    error!("quota exceeded while writing {key:?}");
                    // Earlier attempts may have left an unverified value behind.
                    if attempt > 1 && self.roll_back(key, prior).await {
                        return Err(WriteFailure::recovered(StorageError::QuotaExceeded));
                    }
                    return Err(WriteFailure::new(StorageError::QuotaExceeded));
                }
                Err(err) => {
                    warn!("write to {key:?} failed on attempt {attempt}: {err}");
                    last_error = err;
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.config.retry_delay * attempt).await;
            }
        }

        error!("giving up on {key:?} after {max_attempts} attempts");
        if self.roll_back(key, prior).await {
            Err(WriteFailure::recovered(last_error))
        } else {
            Err(WriteFailure::new(last_error))
        }
    }

    /// Removes the backup slot of `key` while `lock` is held for that key.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock does not cover `key` or the host
    /// removal fails.
    pub async fn remove_backup(&self, lock: &KeyLockGuard, key: &str) -> Result<(), StorageError> {
        self.check_lock(lock, key)?;
        self.store.remove(&self.config.backup_key(key)).await
    }

    async fn take_backup(&self, key: &str) -> Prior {
        let current = match self.store.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => return Prior::Absent,
            Err(err) => {
                warn!("could not read {key:?} for backup: {err}");
                return Prior::Unknown;
            }
        };

        let persisted = match self
            .store
            .set(&self.config.backup_key(key), current.clone())
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!("could not back up {key:?}: {err}");
                false
            }
        };
        Prior::Present {
            value: current,
            persisted,
        }
    }

    /// Restores the prior state of `key`. Returns `true` once confirmed.
    async fn roll_back(&self, key: &str, prior: Prior) -> bool {
        match prior {
            Prior::Skipped | Prior::Unknown => false,
            Prior::Absent => {
                let restored = self.store.remove(key).await.is_ok()
                    && matches!(self.store.get(key).await, Ok(None));
                if restored {
                    info!("rolled back {key:?} to absent");
                }
                restored
            }
            Prior::Present { value, persisted } => {
                let backup_key = self.config.backup_key(key);
                let restore = if persisted {
                    match self.store.get(&backup_key).await {
                        Ok(Some(saved)) => saved,
                        _ => value.clone(),
                    }
                } else {
                    value.clone()
                };

                if let Err(err) = self.store.set(key, restore).await {
                    error!("restoring {key:?} from backup failed: {err}");
                    return false;
                }
                let restored = matches!(self.store.get(key).await, Ok(Some(v)) if v == value);
                if restored {
                    info!("restored {key:?} from backup");
                    if persisted {
                        if let Err(err) = self.store.remove(&backup_key).await {
                            warn!("could not remove backup slot of {key:?}: {err}");
                        }
                    }
                } else {
                    error!("restore of {key:?} could not be confirmed");
                }
                restored
            }
        }
    }
}
