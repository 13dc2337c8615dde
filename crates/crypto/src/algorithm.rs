//! Signing algorithm registry and validation.
//!
//! This module is the single parsing point for algorithm labels. Every
//! label that enters the system — from a resource spec or a token header —
//! goes through [`validate_algorithm`] or [`KeyAlgorithm::from_str`].
//!
//! # Security
//!
//! - Only asymmetric algorithms are accepted
//! - Symmetric algorithms (HS256, HS384, HS512) and `none` are always
//!   rejected, with a message naming the security reason

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Algorithm labels accepted by the rotation strategy.
///
/// The labels are written literally into the JWS `alg` header of issued
/// tokens.
pub const SUPPORTED_ALGORITHMS: &[&str] = &["RS256", "RS384", "RS512", "ES256", "ES384", "ES512"];

/// Algorithm labels that are never accepted for security reasons.
///
/// - `none`: no signature at all (trivially forgeable)
/// - `HS256`, `HS384`, `HS512`: symmetric algorithms — a shared secret
///   cannot be published as a verification key, which this controller
///   exists to do
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Validate an algorithm label against the supported set.
///
/// Forbidden algorithms are rejected with a message naming the security
/// reason; anything else outside [`SUPPORTED_ALGORITHMS`] is rejected as
/// unknown. There is no default algorithm.
///
/// # Errors
///
/// Returns [`CryptoError::UnsupportedAlgorithm`] for any label not in
/// [`SUPPORTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use tokator_crypto::algorithm::validate_algorithm;
///
/// assert!(validate_algorithm("RS256").is_ok());
/// assert!(validate_algorithm("HS256").is_err());
/// assert!(validate_algorithm("none").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), CryptoError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(CryptoError::UnsupportedAlgorithm(format!(
            "'{alg}' is not allowed for security reasons"
        )));
    }

    if !SUPPORTED_ALGORITHMS.contains(&alg) {
        return Err(CryptoError::UnsupportedAlgorithm(format!("'{alg}'")));
    }

    Ok(())
}

/// A supported signing algorithm.
///
/// RS-family algorithms generate RSA-2048 keys. ES-family algorithms all
/// generate P-521 keys: the upstream system used P-521 for ES256 and ES384
/// as well, and published verification keys depend on that pairing, so it
/// is carried here rather than corrected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256, RSA-2048 keys.
    #[serde(rename = "RS256")]
    Rs256,
    /// RSASSA-PKCS1-v1_5 with SHA-384, RSA-2048 keys.
    #[serde(rename = "RS384")]
    Rs384,
    /// RSASSA-PKCS1-v1_5 with SHA-512, RSA-2048 keys.
    #[serde(rename = "RS512")]
    Rs512,
    /// ECDSA over P-521 (see type-level note on the curve pairing).
    #[serde(rename = "ES256")]
    Es256,
    /// ECDSA over P-521 (see type-level note on the curve pairing).
    #[serde(rename = "ES384")]
    Es384,
    /// ECDSA over P-521.
    #[serde(rename = "ES512")]
    Es512,
}

impl KeyAlgorithm {
    /// Returns the JWS `alg` header label for this algorithm.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rs256 => "RS256",
            KeyAlgorithm::Rs384 => "RS384",
            KeyAlgorithm::Rs512 => "RS512",
            KeyAlgorithm::Es256 => "ES256",
            KeyAlgorithm::Es384 => "ES384",
            KeyAlgorithm::Es512 => "ES512",
        }
    }

    /// Whether this algorithm uses RSA key material.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, KeyAlgorithm::Rs256 | KeyAlgorithm::Rs384 | KeyAlgorithm::Rs512)
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_algorithm(s)?;
        match s {
            "RS256" => Ok(KeyAlgorithm::Rs256),
            "RS384" => Ok(KeyAlgorithm::Rs384),
            "RS512" => Ok(KeyAlgorithm::Rs512),
            "ES256" => Ok(KeyAlgorithm::Es256),
            "ES384" => Ok(KeyAlgorithm::Es384),
            "ES512" => Ok(KeyAlgorithm::Es512),
            other => Err(CryptoError::UnsupportedAlgorithm(format!("'{other}'"))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_all_supported_labels_parse() {
        for label in SUPPORTED_ALGORITHMS {
            let alg: KeyAlgorithm = label.parse().expect("supported label should parse");
            assert_eq!(alg.label(), *label);
            assert_eq!(alg.to_string(), *label);
        }
    }

    #[test]
    fn test_forbidden_algorithms_rejected_with_security_message() {
        for label in FORBIDDEN_ALGORITHMS {
            let result = validate_algorithm(label);
            assert!(
                matches!(result, Err(CryptoError::UnsupportedAlgorithm(ref msg)) if msg.contains("security")),
                "expected security rejection for '{label}'"
            );
        }
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let result = "EdDSA".parse::<KeyAlgorithm>();
        assert!(matches!(result, Err(CryptoError::UnsupportedAlgorithm(_))));

        let result = "rs256".parse::<KeyAlgorithm>();
        assert!(matches!(result, Err(CryptoError::UnsupportedAlgorithm(_))), "labels are case-sensitive");
    }

    #[test]
    fn test_rsa_family_split() {
        assert!(KeyAlgorithm::Rs256.is_rsa());
        assert!(KeyAlgorithm::Rs512.is_rsa());
        assert!(!KeyAlgorithm::Es256.is_rsa());
        assert!(!KeyAlgorithm::Es512.is_rsa());
    }

    #[test]
    fn test_serde_uses_wire_labels() {
        let json = serde_json::to_string(&KeyAlgorithm::Es384).unwrap();
        assert_eq!(json, "\"ES384\"");

        let alg: KeyAlgorithm = serde_json::from_str("\"RS512\"").unwrap();
        assert_eq!(alg, KeyAlgorithm::Rs512);
    }
}
