//! Export and import pipeline for prompt packs.
//!
//! Import accepts any of the three historical file shapes:
//!
//! ```text
//! bytes ─ classify ─┬─ Encrypted  ─ password? ─ decrypt_pack ─┐
//!                   ├─ Obfuscated ─────────── decode_obfuscated ┼─ JSON ─ validate ─ PackPayload
//!                   └─ Unknown    ─────────── raw UTF-8 ───────┘
//! ```
//!
//! The plain-JSON branch exists for files written before containers were
//! introduced and carries none of the integrity guarantees.

use log::{debug, warn};
use thiserror::Error;

use super::codec::PackCodec;
use super::crypto::{AeadCipher, GzipCodec, Hasher, Kdf};
use super::error::PackError;
use super::header::{classify, PackKind};
use super::payload::PackPayload;

/// Errors raised while importing a pack file.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The container failed to decode.
    #[error(transparent)]
    Pack(#[from] PackError),

    /// The container is encrypted and no password was supplied.
    #[error("password required for encrypted pack")]
    PasswordRequired,

    /// The decoded content is not a valid pack payload.
    #[error("invalid pack payload: {0}")]
    InvalidPayload(String),
}

/// Password rules applied by front-ends before encrypting or decrypting.
///
/// The codec itself accepts any password; this only keeps user-chosen
/// passwords short enough to remember and type on any device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Minimum length in characters.
    pub min_len: usize,
    /// Maximum length in characters.
    pub max_len: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_len: 1,
            max_len: 14,
        }
    }
}

impl PasswordPolicy {
    /// Checks `password` against the policy.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message describing the violated rule.
    pub fn check(&self, password: &str) -> Result<(), String> {
        let len = password.chars().count();
        if len < self.min_len || len > self.max_len {
            return Err(format!(
                "password must be {}-{} characters",
                self.min_len, self.max_len
            ));
        }
        if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err("password may only contain letters and numbers".to_string());
        }
        Ok(())
    }
}

impl<H, K, A, G> PackCodec<H, K, A, G>
where
    H: Hasher,
    K: Kdf,
    A: AeadCipher,
    G: GzipCodec,
{
    /// Serializes `payload` and frames it.
    ///
    /// With a password the container is encrypted, otherwise obfuscated.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized to JSON.
    pub fn export_pack(
        &self,
        payload: &PackPayload,
        password: Option<&str>,
    ) -> Result<Vec<u8>, serde_json::Error> {
        let json = serde_json::to_vec(payload)?;
        Ok(match password {
            Some(password) => self.encrypt_pack(&json, password),
            None => self.encode_obfuscated(&json),
        })
    }

    /// Decodes pack bytes of any supported shape into a validated payload.
    ///
    /// `password` is only invoked for encrypted containers, which lets UI
    /// callers prompt lazily.
    ///
    /// # Errors
    ///
    /// - [`ImportError::PasswordRequired`] if the container is encrypted and
    ///   `password` returns `None`.
    /// - [`ImportError::Pack`] for any codec failure.
    /// - [`ImportError::InvalidPayload`] if the plaintext is not UTF-8 JSON
    ///   of the expected shape.
    pub fn import_pack<F>(&self, bytes: &[u8], password: F) -> Result<PackPayload, ImportError>
    where
        F: FnOnce() -> Option<String>,
    {
        let kind = classify(bytes);
        debug!("importing {kind} pack of {} bytes", bytes.len());

        let plaintext = match kind {
            PackKind::Encrypted => {
                let password = password().ok_or(ImportError::PasswordRequired)?;
                self.decrypt_pack(bytes, &password)?
            }
            PackKind::Obfuscated => self.decode_obfuscated(bytes)?,
            PackKind::Unknown => {
                warn!("pack has no recognized magic; falling back to plain JSON");
                bytes.to_vec()
            }
        };

        parse_payload(&plaintext)
    }
}

/// Serializes and frames `payload` with the default codec.
///
/// # Errors
///
/// See [`PackCodec::export_pack`].
pub fn export_pack(
    payload: &PackPayload,
    password: Option<&str>,
) -> Result<Vec<u8>, serde_json::Error> {
    <PackCodec>::default().export_pack(payload, password)
}

/// Imports pack bytes with the default codec.
///
/// # Errors
///
/// See [`PackCodec::import_pack`].
pub fn import_pack<F>(bytes: &[u8], password: F) -> Result<PackPayload, ImportError>
where
    F: FnOnce() -> Option<String>,
{
    <PackCodec>::default().import_pack(bytes, password)
}

fn parse_payload(plaintext: &[u8]) -> Result<PackPayload, ImportError> {
    let text = std::str::from_utf8(plaintext)
        .map_err(|err| ImportError::InvalidPayload(format!("not UTF-8: {err}")))?;
    let payload: PackPayload =
        serde_json::from_str(text).map_err(|err| ImportError::InvalidPayload(err.to_string()))?;
    payload.validate().map_err(ImportError::InvalidPayload)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::crypto::{AesGcmCipher, FlateGzip, Pbkdf2Kdf, Sha256Hasher};
    use crate::pack::payload::PackPrompt;

    fn fast_codec() -> PackCodec {
        PackCodec::new(
            Sha256Hasher,
            Pbkdf2Kdf::with_iterations(16),
            AesGcmCipher,
            FlateGzip,
        )
    }

    fn sample_payload() -> PackPayload {
        PackPayload::new(
            "claude",
            Some("Writing".to_string()),
            vec![PackPrompt::new("Rewrite in active voice"), PackPrompt::new("Shorten")],
        )
    }

    #[test]
    fn test_obfuscated_export_import() {
        let codec = fast_codec();
        let bytes = codec.export_pack(&sample_payload(), None).unwrap();
        assert_eq!(classify(&bytes), PackKind::Obfuscated);

        let imported = codec
            .import_pack(&bytes, || panic!("password must not be requested"))
            .unwrap();
        assert_eq!(imported, sample_payload_with(imported.exported_at));
    }

    fn sample_payload_with(at: chrono::DateTime<chrono::Utc>) -> PackPayload {
        PackPayload {
            exported_at: at,
            ..sample_payload()
        }
    }

    #[test]
    fn test_encrypted_export_import() {
        let codec = fast_codec();
        let bytes = codec.export_pack(&sample_payload(), Some("abc123")).unwrap();
        assert_eq!(classify(&bytes), PackKind::Encrypted);

        let imported = codec
            .import_pack(&bytes, || Some("abc123".to_string()))
            .unwrap();
        assert_eq!(imported.prompts.len(), 2);
        assert_eq!(imported.title.as_deref(), Some("Writing"));

        assert!(matches!(
            codec.import_pack(&bytes, || None),
            Err(ImportError::PasswordRequired)
        ));
        assert!(matches!(
            codec.import_pack(&bytes, || Some("nope".to_string())),
            Err(ImportError::Pack(PackError::WrongPassword))
        ));
    }

    #[test]
    fn test_legacy_plain_json_import() {
        let json = br#"{"version":"1.0","source":"gemini","exportedAt":"2024-05-01T10:00:00Z","prompts":[{"text":"hello"}]}"#;
        let imported = import_pack(json, || None).unwrap();
        assert_eq!(imported.source, "gemini");
        assert_eq!(imported.prompts[0].text, "hello");
    }

    #[test]
    fn test_invalid_payload() {
        let codec = fast_codec();
        let bytes = codec.encode_obfuscated(br#"{"prompts":"nope"}"#);
        assert!(matches!(
            codec.import_pack(&bytes, || None),
            Err(ImportError::InvalidPayload(_))
        ));
        assert!(matches!(
            import_pack(&[0xFF, 0xFE, 0x00], || None),
            Err(ImportError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_password_policy() {
        let policy = PasswordPolicy::default();
        policy.check("abcde").unwrap();
        policy.check("A1b2C3d4E5f6G7").unwrap();
        assert!(policy.check("").is_err());
        assert!(policy.check("fifteen-chars!!").is_err());
        assert!(policy.check("has space").is_err());
    }
}
