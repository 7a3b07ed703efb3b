//! Cryptographic and compression primitives used by the pack codec.
//!
//! The codec only depends on the narrow capability traits defined here
//! ([`Hasher`], [`Kdf`], [`AeadCipher`], [`GzipCodec`]). The default
//! implementations are backed by `sha2`, `pbkdf2`, `aes-gcm` and `flate2`.

use std::io::{Read, Write};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{PackError, PackResult};
use super::format::{HASH_SIZE, KEY_SIZE, NONCE_SIZE, OBFUSCATION_KEY, PBKDF2_ITERATIONS, SALT_SIZE};

// =============================================================================
// Key material
// =============================================================================

/// Symmetric pack key (256-bit) derived from a password.
///
/// # Security
///
/// - The key is zeroized on drop.
/// - The key should never be logged or serialized.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PackKey([u8; KEY_SIZE]);

impl PackKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns a reference to the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for PackKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Capability traits
// =============================================================================

/// Integrity hash over plaintext payloads.
pub trait Hasher: Send + Sync {
    /// Hashes `data`.
    fn digest(&self, data: &[u8]) -> [u8; HASH_SIZE];
}

/// Password-based key derivation.
pub trait Kdf: Send + Sync {
    /// Derives a symmetric key from `password` and `salt`.
    fn derive_key(&self, password: &[u8], salt: &[u8; SALT_SIZE]) -> PackKey;
}

/// Authenticated encryption with an embedded tag.
pub trait AeadCipher: Send + Sync {
    /// Encrypts `plaintext`, returning ciphertext followed by the tag.
    fn seal(&self, key: &PackKey, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Vec<u8>;

    /// Decrypts and authenticates `ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::WrongPassword`] if authentication fails.
    fn open(
        &self,
        key: &PackKey,
        nonce: &[u8; NONCE_SIZE],
        ciphertext: &[u8],
    ) -> PackResult<Vec<u8>>;
}

/// Gzip compression.
pub trait GzipCodec: Send + Sync {
    /// Compresses `data` into a gzip member.
    fn compress(&self, data: &[u8]) -> Vec<u8>;

    /// Inflates a gzip member.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Corrupted`] if `data` is not valid gzip.
    fn decompress(&self, data: &[u8]) -> PackResult<Vec<u8>>;
}

// =============================================================================
// Default implementations
// =============================================================================

/// SHA-256 integrity hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn digest(&self, data: &[u8]) -> [u8; HASH_SIZE] {
        let hash = Sha256::digest(data);
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(&hash);
        bytes
    }
}

/// PBKDF2-HMAC-SHA256 key derivation.
#[derive(Debug, Clone, Copy)]
pub struct Pbkdf2Kdf {
    iterations: u32,
}

impl Pbkdf2Kdf {
    /// Creates a KDF with a custom iteration count.
    ///
    /// Containers are only interoperable when both sides use the same count;
    /// lower counts are meant for tests.
    #[must_use]
    pub const fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Returns the configured iteration count.
    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Default for Pbkdf2Kdf {
    fn default() -> Self {
        Self::with_iterations(PBKDF2_ITERATIONS)
    }
}

impl Kdf for Pbkdf2Kdf {
    fn derive_key(&self, password: &[u8], salt: &[u8; SALT_SIZE]) -> PackKey {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, self.iterations, &mut key);
        let derived = PackKey::from_bytes(key);
        key.zeroize();
        derived
    }
}

/// AES-256-GCM with a 96-bit nonce and no associated data.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmCipher;

impl AeadCipher for AesGcmCipher {
    /// # Panics
    ///
    /// Panics only if the plaintext exceeds the AES-GCM message limit
    /// (about 64 GiB), which pack payloads never approach.
    fn seal(&self, key: &PackKey, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Vec<u8> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .expect("AES-GCM encryption of in-memory payload")
    }

    fn open(
        &self,
        key: &PackKey,
        nonce: &[u8; NONCE_SIZE],
        ciphertext: &[u8],
    ) -> PackResult<Vec<u8>> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| PackError::WrongPassword)
    }
}

/// Gzip backed by `flate2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlateGzip;

impl GzipCodec for FlateGzip {
    /// # Panics
    ///
    /// Writing into a `Vec` cannot fail, so the `expect` calls never fire.
    fn compress(&self, data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .expect("gzip into Vec is infallible");
        encoder.finish().expect("gzip into Vec is infallible")
    }

    fn decompress(&self, data: &[u8]) -> PackResult<Vec<u8>> {
        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|_| PackError::Corrupted("payload is not valid gzip"))?;
        Ok(out)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// XORs `data` with the repeating public obfuscation key.
///
/// The transform is its own inverse.
#[must_use]
pub fn xor_obfuscate(data: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(OBFUSCATION_KEY.iter().cycle())
        .map(|(byte, key)| byte ^ key)
        .collect()
}

/// Compares two hashes in constant time.
#[must_use]
pub fn hashes_match(stored: &[u8], computed: &[u8; HASH_SIZE]) -> bool {
    stored.len() == HASH_SIZE && bool::from(stored.ct_eq(computed.as_slice()))
}

/// Fills a fresh random salt.
#[must_use]
pub fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Fills a fresh random nonce.
#[must_use]
pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
