//! Encoding and decoding of `.pmtpk` containers.
//!
//! Two container flavours share one header:
//!
//! - **Obfuscated** (`PPK\0`): `gzip(plaintext)` XORed with a public key.
//!   Defends against casual inspection only.
//! - **Encrypted** (`PPK\1`): `gzip(plaintext)` sealed with AES-256-GCM under
//!   a PBKDF2-derived key.
//!
//! Both carry the SHA-256 of the uncompressed plaintext, re-checked after
//! decoding.

use log::debug;

use super::crypto::{
    hashes_match, random_nonce, random_salt, xor_obfuscate, AeadCipher, AesGcmCipher, FlateGzip,
    GzipCodec, Hasher, Kdf, Pbkdf2Kdf, Sha256Hasher,
};
use super::error::{PackError, PackResult};
use super::header::{PackHeader, PackKind};

/// Pack codec assembled from capability implementations.
///
/// [`PackCodec::default`] uses SHA-256, PBKDF2 (100 000 rounds), AES-256-GCM
/// and `flate2`. The free functions in this module delegate to it.
#[derive(Debug, Clone, Default)]
pub struct PackCodec<H = Sha256Hasher, K = Pbkdf2Kdf, A = AesGcmCipher, G = FlateGzip> {
    hasher: H,
    kdf: K,
    aead: A,
    gzip: G,
}

impl<H, K, A, G> PackCodec<H, K, A, G>
where
    H: Hasher,
    K: Kdf,
    A: AeadCipher,
    G: GzipCodec,
{
    /// Creates a codec from explicit capability implementations.
    pub const fn new(hasher: H, kdf: K, aead: A, gzip: G) -> Self {
        Self {
            hasher,
            kdf,
            aead,
            gzip,
        }
    }

    /// Encodes `plaintext` into an obfuscated container.
    #[must_use]
    pub fn encode_obfuscated(&self, plaintext: &[u8]) -> Vec<u8> {
        let hash = self.hasher.digest(plaintext);
        let compressed = self.gzip.compress(plaintext);
        let body = xor_obfuscate(&compressed);

        let mut out = PackHeader::obfuscated(hash).encode(body.len());
        out.extend_from_slice(&body);
        debug!(
            "encoded obfuscated pack: {} plaintext bytes, {} container bytes",
            plaintext.len(),
            out.len()
        );
        out
    }

    /// Decodes an obfuscated container back to its plaintext.
    ///
    /// # Errors
    ///
    /// - [`PackError::InvalidFormat`] if the container is shorter than the header.
    /// - [`PackError::UnsupportedVersion`] if the version byte is too new.
    /// - [`PackError::Corrupted`] if the body does not inflate or the hash
    ///   does not match.
    pub fn decode_obfuscated(&self, container: &[u8]) -> PackResult<Vec<u8>> {
        let header = PackHeader::decode_as(PackKind::Obfuscated, container)?;
        let body = &container[PackKind::Obfuscated.header_size()..];

        let compressed = xor_obfuscate(body);
        let plaintext = self.gzip.decompress(&compressed)?;
        self.verify_hash(&header, &plaintext)?;
        Ok(plaintext)
    }

    /// Encrypts `plaintext` under `password` into an encrypted container.
    ///
    /// A fresh salt and nonce are drawn for every call, so encrypting the
    /// same input twice yields different containers.
    #[must_use]
    pub fn encrypt_pack(&self, plaintext: &[u8], password: &str) -> Vec<u8> {
        let hash = self.hasher.digest(plaintext);
        let compressed = self.gzip.compress(plaintext);

        let salt = random_salt();
        let nonce = random_nonce();
        let key = self.kdf.derive_key(password.as_bytes(), &salt);
        let ciphertext = self.aead.seal(&key, &nonce, &compressed);

        let mut out = PackHeader::encrypted(hash, salt, nonce).encode(ciphertext.len());
        out.extend_from_slice(&ciphertext);
        debug!(
            "encrypted pack: {} plaintext bytes, {} container bytes",
            plaintext.len(),
            out.len()
        );
        out
    }

    /// Decrypts an encrypted container with `password`.
    ///
    /// # Errors
    ///
    /// - [`PackError::InvalidFormat`] if the container is shorter than the
    ///   encrypted header.
    /// - [`PackError::UnsupportedVersion`] if the version byte is too new.
    /// - [`PackError::WrongPassword`] if AEAD authentication fails, which
    ///   also covers a tampered ciphertext.
    /// - [`PackError::Corrupted`] if the decrypted body does not inflate or
    ///   the hash does not match.
    pub fn decrypt_pack(&self, container: &[u8], password: &str) -> PackResult<Vec<u8>> {
        let header = PackHeader::decode_as(PackKind::Encrypted, container)?;
        let (Some(salt), Some(nonce)) = (header.salt, header.nonce) else {
            return Err(PackError::InvalidFormat("missing salt or nonce"));
        };
        let ciphertext = &container[PackKind::Encrypted.header_size()..];

        let key = self.kdf.derive_key(password.as_bytes(), &salt);
        let compressed = self.aead.open(&key, &nonce, ciphertext)?;
        let plaintext = self.gzip.decompress(&compressed)?;
        self.verify_hash(&header, &plaintext)?;
        Ok(plaintext)
    }

    fn verify_hash(&self, header: &PackHeader, plaintext: &[u8]) -> PackResult<()> {
        let computed = self.hasher.digest(plaintext);
        if hashes_match(&header.hash, &computed) {
            Ok(())
        } else {
            debug!("{} pack failed hash verification", header.kind);
            Err(PackError::Corrupted("hash mismatch"))
        }
    }
}

/// Encodes `plaintext` into an obfuscated container with the default codec.
#[must_use]
pub fn encode_obfuscated(plaintext: &[u8]) -> Vec<u8> {
    <PackCodec>::default().encode_obfuscated(plaintext)
}

/// Decodes an obfuscated container with the default codec.
///
/// # Errors
///
/// See [`PackCodec::decode_obfuscated`].
pub fn decode_obfuscated(container: &[u8]) -> PackResult<Vec<u8>> {
    <PackCodec>::default().decode_obfuscated(container)
}

/// Encrypts `plaintext` under `password` with the default codec.
#[must_use]
pub fn encrypt_pack(plaintext: &[u8], password: &str) -> Vec<u8> {
    <PackCodec>::default().encrypt_pack(plaintext, password)
}

/// Decrypts an encrypted container with the default codec.
///
/// # Errors
///
/// See [`PackCodec::decrypt_pack`].
pub fn decrypt_pack(container: &[u8], password: &str) -> PackResult<Vec<u8>> {
    <PackCodec>::default().decrypt_pack(container, password)
}
