//! Error types for the storage layer.

use thiserror::Error;

/// Result type for host store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for verified writes and atomic updates.
pub type WriteResult<T> = Result<T, WriteFailure>;

/// Marker that host quota errors carry in their message.
const QUOTA_MARKER: &str = "QUOTA_BYTES";

/// Errors raised by host stores and the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The host store refused the write because its quota is exhausted.
    #[error("storage quota exceeded, please delete some data")]
    QuotaExceeded,

    /// Any other host store failure.
    #[error("host store error: {0}")]
    Host(String),

    /// Values could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem failures from file-backed stores.
    #[error("io error: {0}")]
    Io(String),

    /// Read-back verification kept disagreeing with the written value.
    #[error("verification failed for key {key:?} after {attempts} attempts")]
    VerificationFailed {
        /// Key being written.
        key: String,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// A write was attempted under a lock held for a different key.
    #[error("lock for key {held:?} does not cover key {key:?}")]
    LockMismatch {
        /// Key being written.
        key: String,
        /// Key the supplied guard was acquired for.
        held: String,
    },

    /// An atomic update's updater returned an error.
    #[error("update aborted: {0}")]
    Updater(String),
}

impl StorageError {
    /// Returns `true` if the error signals quota exhaustion.
    ///
    /// Host stores that cannot return [`StorageError::QuotaExceeded`] directly
    /// are recognised by the `QUOTA_BYTES` marker in their message.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            Self::QuotaExceeded => true,
            Self::Host(message) => message.contains(QUOTA_MARKER),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Failure of a verified write or atomic update.
///
/// `recovered_from_backup` distinguishes "the write failed but the previous
/// value is intact" from "the write failed and the key may be inconsistent".
/// The latter deserves a user-facing warning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}{}", if *.recovered_from_backup { " (previous value restored)" } else { "" })]
pub struct WriteFailure {
    /// What went wrong.
    pub error: StorageError,
    /// Whether the key was rolled back to its state before the write.
    pub recovered_from_backup: bool,
}

impl WriteFailure {
    /// A failure that left the key untouched or unrecovered.
    #[must_use]
    pub const fn new(error: StorageError) -> Self {
        Self {
            error,
            recovered_from_backup: false,
        }
    }

    /// A failure after which the previous state was restored.
    #[must_use]
    pub const fn recovered(error: StorageError) -> Self {
        Self {
            error,
            recovered_from_backup: true,
        }
    }
}

impl From<StorageError> for WriteFailure {
    fn from(error: StorageError) -> Self {
        Self::new(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_detection() {
        assert!(StorageError::QuotaExceeded.is_quota_exceeded());
        assert!(StorageError::Host("QUOTA_BYTES quota exceeded".to_string()).is_quota_exceeded());
        assert!(!StorageError::Host("disk on fire".to_string()).is_quota_exceeded());
        assert!(!StorageError::Io("QUOTA_BYTES".to_string()).is_quota_exceeded());
    }

    #[test]
    fn test_write_failure_display() {
        let failure = WriteFailure::recovered(StorageError::Host("boom".to_string()));
        assert_eq!(
            failure.to_string(),
            "host store error: boom (previous value restored)"
        );
        let failure = WriteFailure::new(StorageError::QuotaExceeded);
        assert_eq!(
            failure.to_string(),
            "storage quota exceeded, please delete some data"
        );
    }
}
