#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
//! Core library for PromptKit.
//!
//! - [`storage`]: verified, lock-serialized persistence over a plain
//!   key-value host store.
//! - [`pack`]: the `.pmtpk` container format used to move prompt
//!   collections between devices.
//! - [`logger`]: forwarding of this crate's log output to a host logger.

pub mod logger;
pub mod pack;
pub mod storage;

pub use pack::{
    classify, decode_obfuscated, decrypt_pack, encode_obfuscated, encrypt_pack, export_pack,
    import_pack, ImportError, PackError, PackKind, PackPayload, PackPrompt, SCHEMA_VERSION,
};
pub use storage::{
    KeyValueStore, SafeStorage, StorageConfig, StorageError, StorageStats, WriteFailure,
    WriteOptions,
};
