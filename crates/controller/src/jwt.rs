//! Jwt reconciler.
//!
//! Keeps a signed bearer token in an opaque secret, refreshing it well
//! before expiry. The token is signed with the private material of the
//! RotatingKey the resource references, under that key's declared
//! algorithm; the refresh schedule hangs off the token lifetime declared
//! on status (70% of the way through the lifetime the token becomes due,
//! at 80% the controller wakes up).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use tokator_crypto::{
    codec,
    rotation::SigningKey,
    token::{self, Claims},
};

use crate::{
    api::{
        CONTROLLED_LABEL, Jwt, KIND_JWT, KIND_ROTATING_KEY, KIND_SECRET, NamespacedName, Secret,
        ensure_controller_reference,
    },
    clock::Clock,
    config::ReconcilerConfig,
    reconcile::{ReconcileError, ReconcileOutcome, ReconcileResult},
    store::ObjectStore,
};

/// Payload entry under which the compact JWS is stored in the token
/// secret.
pub const TOKEN_PAYLOAD_KEY: &str = "token";

/// Share of the lifetime after which a token becomes due for refresh.
const REFRESH_NUMERATOR: i32 = 7;
/// Share of the lifetime after which the controller schedules its wake-up.
const RECONCILE_NUMERATOR: i32 = 8;
const SCHEDULE_DENOMINATOR: i32 = 10;

/// Drives a Jwt's observed state toward its declared state.
pub struct JwtReconciler {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    config: ReconcilerConfig,
}

impl JwtReconciler {
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
    /// Ensures the token secret exists, refreshes the token when the
    /// status says it is expired, past its expiry, or past its refresh
    /// threshold, then recomputes the schedule and asks to be woken at
    /// the next reconcile instant. A resource that no longer exists is a
    /// successful no-op.
    ///
    /// # Errors
    ///
    /// Store and key material failures abort the pass and are retried by
    /// the runtime. A missing referenced RotatingKey (or its secret) is
    /// such a failure: the token cannot be signed without it.
    #[tracing::instrument(skip(self), fields(jwt = %name))]
    pub async fn reconcile(&self, name: &NamespacedName) -> ReconcileResult {
        let mut jwt = match self.store.get_jwt(name).await {
            Ok(jwt) => jwt,
            Err(e) if e.is_not_found() => {
                debug!("resource not found, nothing to reconcile");
                return Ok(ReconcileOutcome::done());
            },
            Err(e) => return Err(ReconcileError::store(KIND_JWT, name, e)),
        };

        let now = self.clock.now();
        let lifetime = self.token_lifetime(&jwt);

        let mut refreshed = false;
        let mut secret = match self.store.get_secret(name).await {
            Ok(secret) => secret,
            Err(e) if e.is_not_found() => {
                info!("token secret not found, issuing fresh token");
                let token = self.synthesize_token(&mut jwt, now, lifetime).await?;
                let mut secret = Secret::opaque(name, token_payload(token));
                secret
                    .metadata
                    .labels
                    .insert(CONTROLLED_LABEL.to_owned(), "true".to_owned());
                ensure_controller_reference(&mut secret.metadata, KIND_JWT, &name.name);
                refreshed = true;
                self.store
                    .create_secret(&secret)
                    .await
                    .map_err(|e| ReconcileError::store(KIND_SECRET, name, e))?
            },
            Err(e) => return Err(ReconcileError::store(KIND_SECRET, name, e)),
        };

        let stale = jwt.status.expired
            || jwt.status.expires_at.is_none_or(|t| t <= now)
            || jwt.status.refresh_after.is_none_or(|t| t <= now);

        if stale && !refreshed {
            debug!("token due for refresh");
            let token = self.synthesize_token(&mut jwt, now, lifetime).await?;
            secret.string_data.insert(TOKEN_PAYLOAD_KEY.to_owned(), token);
            secret.metadata.labels.insert(CONTROLLED_LABEL.to_owned(), "true".to_owned());
            ensure_controller_reference(&mut secret.metadata, KIND_JWT, &name.name);
            self.store
                .update_secret(&secret)
                .await
                .map_err(|e| ReconcileError::store(KIND_SECRET, name, e))?;
            refreshed = true;
        } else if !refreshed
            && ensure_controller_reference(&mut secret.metadata, KIND_JWT, &name.name)
        {
            self.store
                .update_secret(&secret)
                .await
                .map_err(|e| ReconcileError::store(KIND_SECRET, name, e))?;
        }

        if refreshed {
            jwt.status.last_refresh = Some(now);
        }
        let base = jwt.status.last_refresh.unwrap_or(now);
        let next_reconcile = base + lifetime * RECONCILE_NUMERATOR / SCHEDULE_DENOMINATOR;

        jwt.status.expired = false;
        jwt.status.ready = true;
        jwt.status.expires_at = Some(base + lifetime);
        jwt.status.refresh_after =
            Some(base + lifetime * REFRESH_NUMERATOR / SCHEDULE_DENOMINATOR);
        jwt.status.next_reconcile = Some(next_reconcile);
        jwt.status.last_transition_time = Some(now);
        self.store
            .update_jwt_status(&jwt)
            .await
            .map_err(|e| ReconcileError::store(KIND_JWT, name, e))?;

        Ok(ReconcileOutcome::after((next_reconcile - now).to_std().unwrap_or_default()))
    }

    /// The declared token lifetime, or the configured fallback when the
    /// status value does not parse. Unparseable lifetimes are forgiven,
    /// not fatal.
    fn token_lifetime(&self, jwt: &Jwt) -> Duration {
        let fallback = Duration::from_std(self.config.default_token_lifetime)
            .unwrap_or_else(|_| Duration::minutes(10));
        match humantime::parse_duration(&jwt.status.lifetime)
            .ok()
            .and_then(|d| Duration::from_std(d).ok())
        {
            Some(lifetime) => lifetime,
            None => {
                if !jwt.status.lifetime.is_empty() {
                    debug!(lifetime = %jwt.status.lifetime, "unparseable token lifetime, using default");
                }
                fallback
            },
        }
    }

    /// Signs a fresh token with the referenced RotatingKey's private
    /// material under its declared algorithm, and mirrors that algorithm
    /// onto the Jwt's status.
    async fn synthesize_token(
        &self,
        jwt: &mut Jwt,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<String, ReconcileError> {
        let name = jwt.metadata.namespaced_name();
        let key_name = jwt.spec.rotating_key_ref.namespaced_name();

        let rotating_key = self
            .store
            .get_rotating_key(&key_name)
            .await
            .map_err(|e| ReconcileError::store(KIND_ROTATING_KEY, &key_name, e))?;
        let key_secret = self
            .store
            .get_secret(&key_name)
            .await
            .map_err(|e| ReconcileError::store(KIND_SECRET, &key_name, e))?;

        let pem = codec::private_from_payload(&key_secret.string_data)
            .map_err(|e| ReconcileError::crypto(KIND_JWT, &name, e))?;
        let private_key =
            codec::decode_private(pem).map_err(|e| ReconcileError::crypto(KIND_JWT, &name, e))?;
        let algorithm = rotating_key
            .spec
            .algorithm
            .parse()
            .map_err(|e| ReconcileError::crypto(KIND_ROTATING_KEY, &key_name, e))?;

        let signer = SigningKey {
            kid: rotating_key.status.signing_key.key_id.clone(),
            algorithm,
            private_key,
        };
        let claims = Claims::new(&jwt.spec.subject, now, now + lifetime);
        let token =
            token::sign(&signer, &claims).map_err(|e| ReconcileError::crypto(KIND_JWT, &name, e))?;

        jwt.status.algorithm = rotating_key.spec.algorithm.clone();
        Ok(token)
    }
}

/// Builds the payload map for a token secret.
fn token_payload(token: String) -> std::collections::BTreeMap<String, String> {
    let mut payload = std::collections::BTreeMap::new();
    payload.insert(TOKEN_PAYLOAD_KEY.to_owned(), token);
    payload
}
