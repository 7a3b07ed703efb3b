//! Portable `.pmtpk` pack containers.
//!
//! A pack is an immutable byte string that carries a JSON [`PackPayload`]
//! between devices. It is either obfuscated (readable by anyone with this
//! code) or encrypted with a user password.
//!
//! # File Layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ magic "PPK\0" | "PPK\1"  (4) │
//! │ format version           (1) │
//! │ sha256(plaintext)       (32) │
//! ├──────────────────────────────┤
//! │ salt       (16, encrypted)   │
//! │ nonce      (12, encrypted)   │
//! ├──────────────────────────────┤
//! │ xor(gzip) | aes-gcm(gzip)    │
//! └──────────────────────────────┘
//! ```

pub mod codec;
pub mod crypto;
mod error;
pub mod format;
mod header;
mod import;
mod payload;

pub use codec::{decode_obfuscated, decrypt_pack, encode_obfuscated, encrypt_pack, PackCodec};
pub use crypto::{AeadCipher, GzipCodec, Hasher, Kdf, PackKey};
pub use error::{PackError, PackResult};
pub use format::{FORMAT_VERSION, SCHEMA_VERSION};
pub use header::{classify, PackHeader, PackKind};
pub use import::{export_pack, import_pack, ImportError, PasswordPolicy};
pub use payload::{PackPayload, PackPrompt, DEFAULT_SOURCE};
