//! Error types for pack encoding and decoding.

use thiserror::Error;

/// Result type for pack codec operations.
pub type PackResult<T> = Result<T, PackError>;

/// Failure kinds raised while decoding a `.pmtpk` container.
///
/// The set is closed so callers can match on it exhaustively when deciding
/// what to tell the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    /// The integrity hash did not match the decoded plaintext, or the
    /// compressed payload could not be inflated.
    #[error("pack is corrupted: {0}")]
    Corrupted(&'static str),

    /// AEAD authentication failed.
    ///
    /// A wrong password and a tampered ciphertext are indistinguishable here.
    #[error("wrong password")]
    WrongPassword,

    /// The container was written by a newer format version.
    #[error("unsupported pack format version {0}")]
    UnsupportedVersion(u8),

    /// The container is too short or its header is malformed.
    #[error("invalid pack format: {0}")]
    InvalidFormat(&'static str),
}

impl PackError {
    /// Returns a stable machine-readable code for this failure.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Corrupted(_) => "CORRUPTED",
            Self::WrongPassword => "WRONG_PASSWORD",
            Self::UnsupportedVersion(_) => "UNSUPPORTED_VERSION",
            Self::InvalidFormat(_) => "INVALID_FORMAT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PackError::Corrupted("hash mismatch").code(), "CORRUPTED");
        assert_eq!(PackError::WrongPassword.code(), "WRONG_PASSWORD");
        assert_eq!(PackError::UnsupportedVersion(9).code(), "UNSUPPORTED_VERSION");
        assert_eq!(PackError::InvalidFormat("too short").code(), "INVALID_FORMAT");
        assert_eq!(
            PackError::UnsupportedVersion(2).to_string(),
            "unsupported pack format version 2"
        );
    }
}
