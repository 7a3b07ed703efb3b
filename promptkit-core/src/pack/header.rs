//! Container header definitions and format detection.
//!
//! Every `.pmtpk` container starts with the same 37-byte header. Encrypted
//! containers extend it with the KDF salt and the AEAD nonce.

use super::error::{PackError, PackResult};
use super::format::{
    ENCRYPTED_HEADER_SIZE, FORMAT_VERSION, HASH_OFFSET, HASH_SIZE, HEADER_SIZE, MAGIC_ENCRYPTED,
    MAGIC_OBFUSCATED, MAGIC_SIZE, NONCE_OFFSET, NONCE_SIZE, SALT_OFFSET, SALT_SIZE,
    VERSION_OFFSET,
};

// =============================================================================
// PackKind
// =============================================================================

/// Container flavour, identified by the magic prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackKind {
    /// `PPK\0`: XOR-obfuscated gzip payload.
    Obfuscated,
    /// `PPK\1`: AES-GCM encrypted gzip payload.
    Encrypted,
    /// Anything else, including inputs shorter than the magic.
    Unknown,
}

impl PackKind {
    /// Returns the magic prefix for known kinds.
    #[must_use]
    pub const fn magic(self) -> Option<&'static [u8; MAGIC_SIZE]> {
        match self {
            Self::Obfuscated => Some(MAGIC_OBFUSCATED),
            Self::Encrypted => Some(MAGIC_ENCRYPTED),
            Self::Unknown => None,
        }
    }

    /// Size of the fixed header that precedes the body.
    #[must_use]
    pub const fn header_size(self) -> usize {
        match self {
            Self::Encrypted => ENCRYPTED_HEADER_SIZE,
            Self::Obfuscated | Self::Unknown => HEADER_SIZE,
        }
    }
}

impl std::fmt::Display for PackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Obfuscated => "obfuscated",
            Self::Encrypted => "encrypted",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classifies raw bytes by their magic prefix.
///
/// This is a pure prefix match; nothing beyond the first four bytes is read.
#[must_use]
pub fn classify(bytes: &[u8]) -> PackKind {
    match bytes.get(..MAGIC_SIZE) {
        Some(prefix) if prefix == MAGIC_OBFUSCATED => PackKind::Obfuscated,
        Some(prefix) if prefix == MAGIC_ENCRYPTED => PackKind::Encrypted,
        _ => PackKind::Unknown,
    }
}

// =============================================================================
// PackHeader
// =============================================================================

/// Parsed container header.
///
/// # Binary Layout
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     magic ("PPK\0" | "PPK\1")
/// 4       1     format_version
/// 5       32    sha256(plaintext)
/// 37      16    salt   (encrypted only)
/// 53      12    nonce  (encrypted only)
/// 37|65   ..    body
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackHeader {
    /// Container flavour.
    pub kind: PackKind,
    /// Format version byte.
    pub version: u8,
    /// SHA-256 of the uncompressed plaintext.
    pub hash: [u8; HASH_SIZE],
    /// KDF salt, present for encrypted containers.
    pub salt: Option<[u8; SALT_SIZE]>,
    /// AEAD nonce, present for encrypted containers.
    pub nonce: Option<[u8; NONCE_SIZE]>,
}

impl PackHeader {
    /// Creates an obfuscated-container header.
    #[must_use]
    pub const fn obfuscated(hash: [u8; HASH_SIZE]) -> Self {
        Self {
            kind: PackKind::Obfuscated,
            version: FORMAT_VERSION,
            hash,
            salt: None,
            nonce: None,
        }
    }

    /// Creates an encrypted-container header.
    #[must_use]
    pub const fn encrypted(
        hash: [u8; HASH_SIZE],
        salt: [u8; SALT_SIZE],
        nonce: [u8; NONCE_SIZE],
    ) -> Self {
        Self {
            kind: PackKind::Encrypted,
            version: FORMAT_VERSION,
            hash,
            salt: Some(salt),
            nonce: Some(nonce),
        }
    }

    /// Encodes the header, reserving room for a body of `body_len` bytes.
    #[must_use]
    pub fn encode(&self, body_len: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.kind.header_size() + body_len);
        if let Some(magic) = self.kind.magic() {
            buf.extend_from_slice(magic);
        }
        buf.push(self.version);
        buf.extend_from_slice(&self.hash);
        if let Some(salt) = &self.salt {
            buf.extend_from_slice(salt);
        }
        if let Some(nonce) = &self.nonce {
            buf.extend_from_slice(nonce);
        }
        buf
    }

    /// Parses the header of a container whose kind is already known.
    ///
    /// The magic itself is not re-checked: callers pick the decode path from
    /// [`classify`] and this function only validates length and version.
    ///
    /// # Errors
    ///
    /// - [`PackError::InvalidFormat`] if `bytes` is shorter than the header
    ///   for `kind`, or `kind` is [`PackKind::Unknown`].
    /// - [`PackError::UnsupportedVersion`] if the version byte is newer than
    ///   [`FORMAT_VERSION`].
    pub fn decode_as(kind: PackKind, bytes: &[u8]) -> PackResult<Self> {
        if kind == PackKind::Unknown {
            return Err(PackError::InvalidFormat("unrecognized magic bytes"));
        }
        if bytes.len() < kind.header_size() {
            return Err(PackError::InvalidFormat("file is too small"));
        }

        let version = bytes[VERSION_OFFSET];
        if version > FORMAT_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }

        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&bytes[HASH_OFFSET..HEADER_SIZE]);

        let (salt, nonce) = if kind == PackKind::Encrypted {
            let mut salt = [0u8; SALT_SIZE];
            salt.copy_from_slice(&bytes[SALT_OFFSET..NONCE_OFFSET]);
            let mut nonce = [0u8; NONCE_SIZE];
            nonce.copy_from_slice(&bytes[NONCE_OFFSET..ENCRYPTED_HEADER_SIZE]);
            (Some(salt), Some(nonce))
        } else {
            (None, None)
        };

        Ok(Self {
            kind,
            version,
            hash,
            salt,
            nonce,
        })
    }

    /// Classifies `bytes` and parses the header.
    ///
    /// # Errors
    ///
    /// Same as [`PackHeader::decode_as`].
    pub fn parse(bytes: &[u8]) -> PackResult<Self> {
        Self::decode_as(classify(bytes), bytes)
    }

    /// Returns the plaintext hash as lowercase hex.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}
