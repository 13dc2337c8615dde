//! RotatingKey reconciler.
//!
//! One reconcile is a single level-triggered pass: load the resource,
//! make sure its key secret exists, hydrate the engine's working record
//! from status plus secret, rotate if the schedule says so (or the
//! published public key no longer matches the secret), write back, and
//! say when to be woken next.
//!
//! The secret write and the status write are two separate steps with no
//! transaction between them. A crash in the gap leaves the secret ahead
//! of status; the drift check in the next pass notices the mismatch and
//! forces a rotation, which converges both again.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tokator_crypto::{
    codec,
    error::CryptoError,
    rotation::{Keys, Rotator, generate_kid},
    strategy::RotationStrategy,
};

use crate::{
    api::{
        KIND_ROTATING_KEY, KIND_SECRET, NamespacedName, RotatingKey, Secret, SigningKeyStatus,
        ensure_controller_reference,
    },
    clock::Clock,
    config::ReconcilerConfig,
    projection,
    reconcile::{ReconcileError, ReconcileOutcome, ReconcileResult, parse_duration_field},
    store::ObjectStore,
};

/// Drives a RotatingKey's observed state toward its declared state.
pub struct RotatingKeyReconciler {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    config: ReconcilerConfig,
}

impl RotatingKeyReconciler {
    /// Creates a reconciler with default configuration.
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, ReconcilerConfig::default())
    }

    /// Creates a reconciler with explicit configuration.
    pub fn with_config(
        store: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        config: ReconcilerConfig,
    ) -> Self {
        Self { store, clock, config }
    }

    /// Runs one reconcile pass for the named resource.
    ///
    /// Returns the delay until the next scheduled pass: the time left
    /// until `next_rotation` plus a small slack. A resource that no
    /// longer exists is a successful no-op.
    ///
    /// # Errors
    ///
    /// Any store, key material, or spec parsing failure aborts the pass
    /// and is surfaced to the runtime, which retries with backoff. Spec
    /// errors (unknown algorithm, bad duration) recur until the spec is
    /// corrected; the status is never advanced past them.
    #[tracing::instrument(skip(self), fields(rotatingkey = %name))]
    pub async fn reconcile(&self, name: &NamespacedName) -> ReconcileResult {
        let mut rotating_key = match self.store.get_rotating_key(name).await {
            Ok(key) => key,
            Err(e) if e.is_not_found() => {
                debug!("resource not found, nothing to reconcile");
                return Ok(ReconcileOutcome::done());
            },
            Err(e) => return Err(ReconcileError::store(KIND_ROTATING_KEY, name, e)),
        };

        // Resolve the spec before touching anything, so a bad algorithm
        // or duration never advances observed state.
        let rotate_after = parse_duration_field(
            KIND_ROTATING_KEY,
            name,
            "rotateAfter",
            &rotating_key.spec.rotate_after,
        )?;
        let lifetime =
            parse_duration_field(KIND_ROTATING_KEY, name, "lifetime", &rotating_key.spec.lifetime)?;
        let strategy = RotationStrategy::new(&rotating_key.spec.algorithm, rotate_after, lifetime)
            .map_err(|e| ReconcileError::crypto(KIND_ROTATING_KEY, name, e))?;

        let now = self.clock.now();

        let mut secret = match self.store.get_secret(name).await {
            Ok(secret) => secret,
            Err(e) if e.is_not_found() => {
                self.create_initial_secret(&mut rotating_key, &strategy, now).await?
            },
            Err(e) => return Err(ReconcileError::store(KIND_SECRET, name, e)),
        };

        let mut keys = projection::status_to_keys(&rotating_key, &secret)
            .map_err(|e| ReconcileError::crypto(KIND_ROTATING_KEY, name, e))?;

        let due = now >= keys.next_rotation;
        let drifted = signing_key_drifted(name, &rotating_key, &keys)?;

        if due || drifted {
            if drifted && !due {
                warn!("published signing key does not match secret material, forcing rotation");
            }

            keys = Rotator::new(strategy)
                .rotate(keys, now)
                .map_err(|e| ReconcileError::crypto(KIND_ROTATING_KEY, name, e))?;
            let signer = keys.signing_key.as_ref().ok_or_else(|| {
                ReconcileError::crypto(
                    KIND_ROTATING_KEY,
                    name,
                    CryptoError::GenerationFailed("rotation installed no signing key".into()),
                )
            })?;

            let pem = codec::encode_private(&signer.private_key)
                .map_err(|e| ReconcileError::crypto(KIND_ROTATING_KEY, name, e))?;
            secret.string_data = codec::private_to_payload(&pem);
            ensure_controller_reference(&mut secret.metadata, KIND_ROTATING_KEY, &name.name);
            self.store
                .update_secret(&secret)
                .await
                .map_err(|e| ReconcileError::store(KIND_SECRET, name, e))?;

            info!(kid = %signer.kid, next_rotation = %keys.next_rotation, "rotated signing key");
        } else if ensure_controller_reference(&mut secret.metadata, KIND_ROTATING_KEY, &name.name) {
            // Adopt a pre-existing secret that nothing owns yet.
            self.store
                .update_secret(&secret)
                .await
                .map_err(|e| ReconcileError::store(KIND_SECRET, name, e))?;
        }

        rotating_key.status = projection::keys_to_status(&keys)
            .map_err(|e| ReconcileError::crypto(KIND_ROTATING_KEY, name, e))?;
        self.store
            .update_rotating_key_status(&rotating_key)
            .await
            .map_err(|e| ReconcileError::store(KIND_ROTATING_KEY, name, e))?;

        let until_rotation = (keys.next_rotation - now).to_std().unwrap_or_default();
        Ok(ReconcileOutcome::after(until_rotation + self.config.requeue_slack))
    }

    /// Generates the first key pair, writes its secret, and seeds the
    /// status with the public half and the first rotation deadline.
    async fn create_initial_secret(
        &self,
        rotating_key: &mut RotatingKey,
        strategy: &RotationStrategy,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Secret, ReconcileError> {
        let name = rotating_key.metadata.namespaced_name();
        info!("key secret not found, creating initial key material");

        let private_key = strategy
            .generate()
            .map_err(|e| ReconcileError::crypto(KIND_ROTATING_KEY, &name, e))?;
        let kid = generate_kid();

        let pem = codec::encode_private(&private_key)
            .map_err(|e| ReconcileError::crypto(KIND_ROTATING_KEY, &name, e))?;
        let mut secret = Secret::opaque(&name, codec::private_to_payload(&pem));
        ensure_controller_reference(&mut secret.metadata, KIND_ROTATING_KEY, &name.name);
        let secret = self
            .store
            .create_secret(&secret)
            .await
            .map_err(|e| ReconcileError::store(KIND_SECRET, &name, e))?;

        rotating_key.status.signing_key = SigningKeyStatus {
            key_id: kid,
            key_use: projection::USE_SIGNING.to_owned(),
            public_key: codec::encode_public(&private_key.public_key())
                .map_err(|e| ReconcileError::crypto(KIND_ROTATING_KEY, &name, e))?,
        };
        rotating_key.status.next_rotation = Some(now + strategy.rotation_frequency());

        Ok(secret)
    }
}

/// Whether the published signing public key no longer matches the public
/// half derivable from the secret's private key. Catches out-of-band
/// secret replacement and a crash between the secret and status writes.
fn signing_key_drifted(
    name: &NamespacedName,
    rotating_key: &RotatingKey,
    keys: &Keys,
) -> Result<bool, ReconcileError> {
    let Some(signer) = &keys.signing_key else {
        return Ok(true);
    };
    let derived = codec::encode_public(&signer.private_key.public_key())
        .map_err(|e| ReconcileError::crypto(KIND_ROTATING_KEY, name, e))?;
    Ok(derived != rotating_key.status.signing_key.public_key)
}
