//! Tunables for the verified writer and storage facade.

use std::time::Duration;

/// Default number of write attempts before rolling back.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between attempts; attempt `n` waits `n` times this.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Default prefix of backup slot keys.
pub const DEFAULT_BACKUP_PREFIX: &str = "_backup_";

/// Default delay before a backup slot is removed after a successful write.
pub const DEFAULT_BACKUP_TTL: Duration = Duration::from_secs(5);

/// Default assumed quota of the host store (5 MiB).
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Default usage percentage at which storage is reported as low.
pub const DEFAULT_LOW_STORAGE_THRESHOLD_PERCENT: f64 = 80.0;

/// Storage configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Total write attempts, including the first one.
    pub max_retries: u32,
    /// Linear backoff base between attempts.
    pub retry_delay: Duration,
    /// Prefix prepended to a key to form its backup slot key.
    pub backup_prefix: String,
    /// How long a backup slot survives a successful write.
    pub backup_ttl: Duration,
    /// Quota used for usage statistics.
    pub quota_bytes: u64,
    /// Usage percentage at which [`crate::storage::SafeStorage::is_storage_low`] trips.
    pub low_storage_threshold_percent: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            backup_prefix: DEFAULT_BACKUP_PREFIX.to_string(),
            backup_ttl: DEFAULT_BACKUP_TTL,
            quota_bytes: DEFAULT_QUOTA_BYTES,
            low_storage_threshold_percent: DEFAULT_LOW_STORAGE_THRESHOLD_PERCENT,
        }
    }
}

impl StorageConfig {
    /// Sets the number of write attempts (at least one).
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Sets the backoff base.
    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Sets the backup slot prefix.
    #[must_use]
    pub fn with_backup_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.backup_prefix = prefix.into();
        self
    }

    /// Sets how long backup slots survive a successful write.
    #[must_use]
    pub const fn with_backup_ttl(mut self, backup_ttl: Duration) -> Self {
        self.backup_ttl = backup_ttl;
        self
    }

    /// Sets the quota used for usage statistics.
    #[must_use]
    pub const fn with_quota_bytes(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    /// Sets the low-storage threshold in percent.
    #[must_use]
    pub const fn with_low_storage_threshold(mut self, percent: f64) -> Self {
        self.low_storage_threshold_percent = percent;
        self
    }

    /// Returns the backup slot key for `key`.
    #[must_use]
    pub fn backup_key(&self, key: &str) -> String {
        format!("{}{key}", self.backup_prefix)
    }

    /// Returns `true` if `key` names a backup slot.
    #[must_use]
    pub fn is_backup_key(&self, key: &str) -> bool {
        key.starts_with(&self.backup_prefix)
    }
}
