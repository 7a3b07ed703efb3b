//! Pack file format constants and layout definitions.
//!
//! This module defines the binary framing of `.pmtpk` containers: magic
//! bytes, the format version, field sizes and the fixed header offsets.

// Layout comments describe binary structure, not Rust identifiers
#![allow(clippy::doc_markdown)]


/// Magic bytes of an obfuscated container (`"PPK\0"`).
pub const MAGIC_OBFUSCATED: &[u8; 4] = b"PPK\x00";

/// Magic bytes of a password-encrypted container (`"PPK\1"`).
pub const MAGIC_ENCRYPTED: &[u8; 4] = b"PPK\x01";

/// Length of the magic prefix.
pub const MAGIC_SIZE: usize = 4;


/// Highest container format version this implementation understands.
pub const FORMAT_VERSION: u8 = 0x01;

/// Schema version written into exported JSON payloads.
pub const SCHEMA_VERSION: &str = "1.0";


/// Size of SHA-256 hash output in bytes.
pub const HASH_SIZE: usize = 32;

/// Size of the PBKDF2 salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Size of the derived AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// PBKDF2-HMAC-SHA256 iteration count used for pack passwords.
pub const PBKDF2_ITERATIONS: u32 = 100_000;


/// Byte offset of the format version.
pub const VERSION_OFFSET: usize = MAGIC_SIZE;

/// Byte offset of the plaintext hash.
pub const HASH_OFFSET: usize = VERSION_OFFSET + 1;

/// Size of the common header.
/// Layout: magic(4) + version(1) + hash(32) = 37
pub const HEADER_SIZE: usize = HASH_OFFSET + HASH_SIZE;

/// Byte offset of the salt in encrypted containers.
pub const SALT_OFFSET: usize = HEADER_SIZE;

/// Byte offset of the nonce in encrypted containers.
pub const NONCE_OFFSET: usize = SALT_OFFSET + SALT_SIZE;

/// Size of the encrypted header.
/// Layout: header(37) + salt(16) + nonce(12) = 65
pub const ENCRYPTED_HEADER_SIZE: usize = NONCE_OFFSET + NONCE_SIZE;


/// Repeating XOR key for obfuscated containers (`"PromptPack"`).
///
/// This key is public. It only keeps payloads unreadable in a text editor.
pub const OBFUSCATION_KEY: &[u8; 10] = b"PromptPack";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_constants() {
        assert_eq!(HEADER_SIZE, 37);
        assert_eq!(SALT_OFFSET, 37);
        assert_eq!(NONCE_OFFSET, 53);
        assert_eq!(ENCRYPTED_HEADER_SIZE, 65);
        assert_eq!(MAGIC_OBFUSCATED, &[0x50, 0x50, 0x4B, 0x00]);
        assert_eq!(MAGIC_ENCRYPTED, &[0x50, 0x50, 0x4B, 0x01]);
        assert_eq!(
            OBFUSCATION_KEY,
            &[0x50, 0x72, 0x6F, 0x6D, 0x70, 0x74, 0x50, 0x61, 0x63, 0x6B]
        );
    }
}
