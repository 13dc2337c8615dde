//! Rotation strategy: algorithm plus schedule parameters.

use chrono::Duration;

use crate::{
    algorithm::KeyAlgorithm,
    error::CryptoResult,
    material::PrivateKeyMaterial,
};

/// Describes how signing keys are generated, how often they rotate, and
/// how long they remain usable for verification after rotation.
///
/// The strategy is a pure record: it carries no mutable state and no
/// storage handles. Resolving an algorithm label happens here and nowhere
/// downstream — an unrecognized label fails construction, there is no
/// default algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotationStrategy {
    algorithm: KeyAlgorithm,
    /// Time between rotations.
    rotation_frequency: Duration,
    /// How long a demoted key keeps validating signatures. Matches the
    /// maximum validity of any token signed under it.
    id_token_valid_for: Duration,
}

impl RotationStrategy {
    /// Resolves an algorithm label and two durations into a strategy.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnsupportedAlgorithm`] for labels outside
    /// the supported set (see [`crate::algorithm::SUPPORTED_ALGORITHMS`]).
    ///
    /// [`CryptoError::UnsupportedAlgorithm`]: crate::error::CryptoError::UnsupportedAlgorithm
    pub fn new(
        algorithm: &str,
        rotation_frequency: Duration,
        id_token_valid_for: Duration,
    ) -> CryptoResult<Self> {
        Ok(Self { algorithm: algorithm.parse()?, rotation_frequency, id_token_valid_for })
    }

    /// Generates fresh private key material for the strategy's algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::GenerationFailed`] on RNG failure.
    ///
    /// [`CryptoError::GenerationFailed`]: crate::error::CryptoError::GenerationFailed
    pub fn generate(&self) -> CryptoResult<PrivateKeyMaterial> {
        self.algorithm.generate()
    }

    /// The resolved algorithm.
    #[must_use]
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Time between rotations.
    #[must_use]
    pub fn rotation_frequency(&self) -> Duration {
        self.rotation_frequency
    }

    /// Verification grace window after demotion.
    #[must_use]
    pub fn id_token_valid_for(&self) -> Duration {
        self.id_token_valid_for
    }
}
