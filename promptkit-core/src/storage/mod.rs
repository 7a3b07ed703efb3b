//! Atomic, verified, self-healing key-value storage.
//!
//! This module synthesizes transactional guarantees on top of a host store
//! that offers none. It has three layers:
//!
//! 1. **Host store** ([`KeyValueStore`]): plain `get`/`set`/`remove` of JSON
//!    values. [`MemoryStore`] and [`JsonFileStore`] ship with the crate.
//!
//! 2. **Verified writer** ([`VerifiedWriter`]): backs up the previous value,
//!    writes, reads back and compares, retries with linear backoff, and rolls
//!    back when retries run out.
//!
//! 3. **Storage facade** ([`SafeStorage`]): per-key locking through a
//!    [`LockManager`], atomic read-modify-write, usage statistics and bulk
//!    export/import.
//!
//! # Backup Slots
//!
//! A key's previous value is shadowed under `"_backup_" + key` during a
//! risky write and removed a few seconds after the write is confirmed.
//! Backup slots never appear in [`SafeStorage::export_all`] and are never
//! accepted by [`SafeStorage::import_all`].

pub mod config;
mod error;
pub mod file;
pub mod lock;
pub mod memory;
mod safe_storage;
pub mod traits;
pub mod writer;

pub use config::StorageConfig;
pub use error::{StorageError, StorageResult, WriteFailure, WriteResult};
pub use file::JsonFileStore;
pub use lock::{KeyLockGuard, LockManager};
pub use memory::MemoryStore;
pub use safe_storage::{SafeStorage, StorageStats};
pub use traits::KeyValueStore;
pub use writer::{VerifiedWriter, WriteOptions, WriteReport};
