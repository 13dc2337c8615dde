//! Key material and token error types.

use thiserror::Error;

/// Errors produced while generating, encoding, or using key material.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]` — new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CryptoError {
    /// The requested signing algorithm is not in the supported set.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// PEM or DER material could not be decoded.
    ///
    /// The message names the PEM block type actually encountered so that
    /// operators can tell a truncated secret from a mislabeled one.
    #[error("bad key format: {0}")]
    BadFormat(String),

    /// The secret payload does not contain the expected entry.
    #[error("secret payload missing '{0}' entry")]
    MissingPayloadKey(&'static str),

    /// Key generation failed (RNG failure or parameter rejection).
    #[error("key generation failed: {0}")]
    GenerationFailed(String),

    /// Token could not be signed.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// Token could not be verified against the given public key.
    #[error("token verification failed: {0}")]
    Verification(String),
}

impl From<rsa::Error> for CryptoError {
    fn from(err: rsa::Error) -> Self {
        CryptoError::GenerationFailed(err.to_string())
    }
}

/// Result type alias for key material operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CryptoError::UnsupportedAlgorithm("'HS256'".into());
        assert_eq!(err.to_string(), "unsupported algorithm: 'HS256'");

        let err = CryptoError::MissingPayloadKey("private_key");
        assert_eq!(err.to_string(), "secret payload missing 'private_key' entry");

        let err = CryptoError::BadFormat("unexpected PEM block type 'CERTIFICATE'".into());
        assert_eq!(err.to_string(), "bad key format: unexpected PEM block type 'CERTIFICATE'");
    }
}
