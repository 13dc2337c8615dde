//! Key rotation engine.
//!
//! [`Rotator::rotate`] is a pure transformer over a [`Keys`] record: it
//! takes the current record and the current instant and returns the
//! rotated record. It never touches storage and never refuses to rotate
//! based on the schedule — gating rotation on `next_rotation` is the
//! caller's job. Invoked early (for example by a second controller
//! replica that lost the race), it logs a contention warning and proceeds;
//! the superfluous key is reconciled away by the optimistic-concurrency
//! check on the subsequent status write.

use chrono::{DateTime, Utc};
use rand::{RngCore, rngs::OsRng};
use tracing::{debug, warn};

use crate::{
    algorithm::KeyAlgorithm,
    error::CryptoResult,
    material::{PrivateKeyMaterial, PublicKeyMaterial},
    strategy::RotationStrategy,
};

/// Number of random bytes in a generated key ID (hex-encoded to twice
/// this many characters).
pub const KID_BYTES: usize = 20;

/// Generates a fresh random key ID.
#[must_use]
pub fn generate_kid() -> String {
    let mut bytes = [0u8; KID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The active signing key: private material plus its algorithm and kid.
#[derive(Clone, Debug)]
pub struct SigningKey {
    /// Key ID, stable for the key's lifetime.
    pub kid: String,
    /// Algorithm the key was generated for.
    pub algorithm: KeyAlgorithm,
    /// Private key material.
    pub private_key: PrivateKeyMaterial,
}

/// A rotated signing key which can still be used to verify signatures
/// until its expiry.
#[derive(Clone, Debug)]
pub struct VerificationKey {
    /// Key ID carried over from the key's signing days.
    pub kid: String,
    /// Public half; the private half was discarded at demotion.
    pub public_key: PublicKeyMaterial,
    /// Instant after which the key is evicted.
    pub expires_at: DateTime<Utc>,
}

/// The full working record for a rotating key: the current signer, the
/// retained verifiers, and the next rotation instant.
#[derive(Clone, Debug)]
pub struct Keys {
    /// Key currently used for signing. Absent only before the first
    /// rotation seeds one.
    pub signing_key: Option<SigningKey>,
    /// Retired signing keys retained for signature verification, oldest
    /// first.
    pub verification_keys: Vec<VerificationKey>,
    /// The next time the signing key rotates. Callers must not rotate
    /// before this time (the engine itself does not enforce it).
    pub next_rotation: DateTime<Utc>,
}

impl Keys {
    /// An empty record that is immediately due for rotation.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            signing_key: None,
            verification_keys: Vec::new(),
            next_rotation: DateTime::UNIX_EPOCH,
        }
    }

    /// Looks up a retained verification key by kid.
    #[must_use]
    pub fn verification_key(&self, kid: &str) -> Option<&VerificationKey> {
        self.verification_keys.iter().find(|k| k.kid == kid)
    }
}

/// Rotates [`Keys`] records according to a [`RotationStrategy`].
#[derive(Clone, Copy, Debug)]
pub struct Rotator {
    strategy: RotationStrategy,
}

impl Rotator {
    /// Creates a rotator for the given strategy.
    #[must_use]
    pub fn new(strategy: RotationStrategy) -> Self {
        Self { strategy }
    }

    /// Performs one rotation at instant `now` and returns the new record.
    ///
    /// In order:
    ///
    /// 1. Generate a fresh private key and a random kid.
    /// 2. Evict verification keys whose expiry has passed, preserving the
    ///    relative order of the survivors.
    /// 3. Demote the incoming signing key (if any) to a verification key
    ///    expiring at `now` plus the strategy's grace window, discarding
    ///    the private half.
    /// 4. Install the fresh key with `next_rotation` one rotation
    ///    frequency ahead of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationFailed`](crate::error::CryptoError::GenerationFailed)
    /// if key generation fails; there is no other error case, so rotation
    /// cannot partially apply.
    pub fn rotate(&self, keys: Keys, now: DateTime<Utc>) -> CryptoResult<Keys> {
        // Generate before touching the record, so a generation failure
        // leaves nothing half-rotated.
        let private_key = self.strategy.generate()?;
        let kid = generate_kid();

        if now < keys.next_rotation {
            // Another controller replica may already have rotated; the
            // loser of the race leaks this generated key.
            warn!(
                next_rotation = %keys.next_rotation,
                "rotation invoked before the scheduled time, proceeding anyway"
            );
        }

        let mut verification_keys: Vec<VerificationKey> =
            keys.verification_keys.into_iter().filter(|key| key.expires_at > now).collect();

        if let Some(previous) = keys.signing_key {
            verification_keys.push(VerificationKey {
                kid: previous.kid,
                public_key: previous.private_key.public_key(),
                // Keep the demoted key around at least as long as any
                // token it signed can remain valid.
                expires_at: now + self.strategy.id_token_valid_for(),
            });
        }

        let next_rotation = now + self.strategy.rotation_frequency();
        debug!(kid = %kid, %next_rotation, "installed new signing key");

        Ok(Keys {
            signing_key: Some(SigningKey {
                kid,
                algorithm: self.strategy.algorithm(),
                private_key,
            }),
            verification_keys,
            next_rotation,
        })
    }
}
