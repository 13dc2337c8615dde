//! Asymmetric key material variants.
//!
//! Key material is a tagged enum rather than a trait object so that the
//! codec and token modules can dispatch on the concrete family without
//! downcasting. Two families exist: RSA-2048 for the RS algorithms and
//! NIST P-521 for the ES algorithms.

use rand::rngs::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::{
    algorithm::KeyAlgorithm,
    error::{CryptoError, CryptoResult},
};

/// RSA modulus size for generated keys, in bits.
pub const RSA_KEY_BITS: usize = 2048;

/// Private key material for one of the supported algorithm families.
#[derive(Clone, Debug)]
pub enum PrivateKeyMaterial {
    /// RSA-2048 private key.
    Rsa(RsaPrivateKey),
    /// NIST P-521 private scalar.
    Ec(p521::SecretKey),
}

/// Public key material matching [`PrivateKeyMaterial`].
#[derive(Clone, Debug, PartialEq)]
pub enum PublicKeyMaterial {
    /// RSA public key.
    Rsa(RsaPublicKey),
    /// NIST P-521 public point.
    Ec(p521::PublicKey),
}

impl PrivateKeyMaterial {
    /// Derives the public half of this key.
    #[must_use]
    pub fn public_key(&self) -> PublicKeyMaterial {
        match self {
            PrivateKeyMaterial::Rsa(key) => PublicKeyMaterial::Rsa(key.to_public_key()),
            PrivateKeyMaterial::Ec(key) => PublicKeyMaterial::Ec(key.public_key()),
        }
    }
}

impl KeyAlgorithm {
    /// Generates fresh private key material for this algorithm.
    ///
    /// RS-family algorithms produce RSA-2048 keys; ES-family algorithms
    /// produce P-521 keys. RSA generation is CPU-bound and can take on the
    /// order of a second.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::GenerationFailed`] if the RNG or parameter
    /// generation fails.
    pub fn generate(&self) -> CryptoResult<PrivateKeyMaterial> {
        if self.is_rsa() {
            let key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
                .map_err(|e| CryptoError::GenerationFailed(e.to_string()))?;
            Ok(PrivateKeyMaterial::Rsa(key))
        } else {
            Ok(PrivateKeyMaterial::Ec(p521::SecretKey::random(&mut OsRng)))
        }
    }
}
