//! Object store abstraction and in-memory implementation.
//!
//! The reconcilers only ever talk to an [`ObjectStore`]; the orchestration
//! runtime that actually watches and persists objects implements this
//! trait in production. [`MemoryObjectStore`] is the in-process
//! implementation used by tests and development.
//!
//! # Optimistic concurrency
//!
//! Every persisted object carries a `resource_version`. Updates must
//! present the version they read; a mismatch fails with
//! [`StoreError::Conflict`] and the caller's next reconcile rebuilds from
//! ground truth. Status updates replace only the status subresource —
//! spec and metadata edits through a status update are discarded, as the
//! real runtime would discard them.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::api::{
    Jwt, KIND_JWT, KIND_ROTATING_KEY, KIND_SECRET, NamespacedName, RotatingKey, Secret,
};

/// Errors surfaced by object store operations.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]` — new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The named object does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of the missing object.
        kind: &'static str,
        /// Namespaced name of the missing object.
        name: NamespacedName,
    },

    /// An object with this name already exists.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Kind of the conflicting object.
        kind: &'static str,
        /// Namespaced name of the conflicting object.
        name: NamespacedName,
    },

    /// The update presented a stale resource version; another writer got
    /// there first. Retry from a fresh read.
    #[error("conflict updating {kind} '{name}': stale resource version")]
    Conflict {
        /// Kind of the contended object.
        kind: &'static str,
        /// Namespaced name of the contended object.
        name: NamespacedName,
    },

    /// The store itself failed (network, backend outage). Retryable.
    #[error("transient store error: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
        /// The underlying error, when one exists.
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Creates a [`StoreError::NotFound`].
    #[must_use]
    pub fn not_found(kind: &'static str, name: &NamespacedName) -> Self {
        StoreError::NotFound { kind, name: name.clone() }
    }

    /// Creates a [`StoreError::Conflict`].
    #[must_use]
    pub fn conflict(kind: &'static str, name: &NamespacedName) -> Self {
        StoreError::Conflict { kind, name: name.clone() }
    }

    /// Whether this error is a missing-object error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Whether this error is an optimistic-concurrency conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type alias for object store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary between the reconcilers and the cluster.
///
/// Operations are keyed by namespaced name and typed by kind. All writes
/// return the stored object with its bumped `resource_version`, so
/// callers can chain further writes without re-reading.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetches a RotatingKey.
    async fn get_rotating_key(&self, name: &NamespacedName) -> StoreResult<RotatingKey>;

    /// Persists a new RotatingKey.
    async fn create_rotating_key(&self, key: &RotatingKey) -> StoreResult<RotatingKey>;

    /// Replaces the status subresource of a RotatingKey.
    async fn update_rotating_key_status(&self, key: &RotatingKey) -> StoreResult<RotatingKey>;

    /// Fetches a Jwt.
    async fn get_jwt(&self, name: &NamespacedName) -> StoreResult<Jwt>;

    /// Persists a new Jwt.
    async fn create_jwt(&self, jwt: &Jwt) -> StoreResult<Jwt>;

    /// Replaces the status subresource of a Jwt.
    async fn update_jwt_status(&self, jwt: &Jwt) -> StoreResult<Jwt>;

    /// Fetches a Secret.
    async fn get_secret(&self, name: &NamespacedName) -> StoreResult<Secret>;

    /// Persists a new Secret.
    async fn create_secret(&self, secret: &Secret) -> StoreResult<Secret>;

    /// Replaces an existing Secret.
    async fn update_secret(&self, secret: &Secret) -> StoreResult<Secret>;
}

/// In-memory [`ObjectStore`] for testing and development.
///
/// # Thread Safety
///
/// Uses [`parking_lot::RwLock`] per kind for concurrent access. All
/// clones share the same underlying maps.
///
/// # Examples
///
/// ```
/// use tokator_controller::api::{NamespacedName, RotatingKey, RotatingKeySpec};
/// use tokator_controller::store::{MemoryObjectStore, ObjectStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryObjectStore::new();
/// let name = NamespacedName::new("default", "signer");
///
/// let key = RotatingKey::new(
///     &name,
///     RotatingKeySpec {
///         algorithm: "RS256".into(),
///         rotate_after: "24h".into(),
///         lifetime: "48h".into(),
///     },
/// );
/// store.create_rotating_key(&key).await?;
///
/// let stored = store.get_rotating_key(&name).await?;
/// assert_eq!(stored.metadata.resource_version, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStore {
    rotating_keys: Arc<RwLock<HashMap<NamespacedName, RotatingKey>>>,
    jwts: Arc<RwLock<HashMap<NamespacedName, Jwt>>>,
    secrets: Arc<RwLock<HashMap<NamespacedName, Secret>>>,
}

impl MemoryObjectStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    #[tracing::instrument(skip(self), fields(rotatingkey = %name))]
    async fn get_rotating_key(&self, name: &NamespacedName) -> StoreResult<RotatingKey> {
        self.rotating_keys
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(KIND_ROTATING_KEY, name))
    }

    #[tracing::instrument(skip(self, key), fields(rotatingkey = %key.metadata.namespaced_name()))]
    async fn create_rotating_key(&self, key: &RotatingKey) -> StoreResult<RotatingKey> {
        create(&self.rotating_keys, KIND_ROTATING_KEY, key.metadata.namespaced_name(), key, |k, v| {
            k.metadata.resource_version = v;
        })
    }

    #[tracing::instrument(skip(self, key), fields(rotatingkey = %key.metadata.namespaced_name()))]
    async fn update_rotating_key_status(&self, key: &RotatingKey) -> StoreResult<RotatingKey> {
        let name = key.metadata.namespaced_name();
        let mut map = self.rotating_keys.write();
        let stored =
            map.get_mut(&name).ok_or_else(|| StoreError::not_found(KIND_ROTATING_KEY, &name))?;

        if stored.metadata.resource_version != key.metadata.resource_version {
            return Err(StoreError::conflict(KIND_ROTATING_KEY, &name));
        }

        stored.status = key.status.clone();
        stored.metadata.resource_version += 1;
        Ok(stored.clone())
    }

    #[tracing::instrument(skip(self), fields(jwt = %name))]
    async fn get_jwt(&self, name: &NamespacedName) -> StoreResult<Jwt> {
        self.jwts.read().get(name).cloned().ok_or_else(|| StoreError::not_found(KIND_JWT, name))
    }

    #[tracing::instrument(skip(self, jwt), fields(jwt = %jwt.metadata.namespaced_name()))]
    async fn create_jwt(&self, jwt: &Jwt) -> StoreResult<Jwt> {
        create(&self.jwts, KIND_JWT, jwt.metadata.namespaced_name(), jwt, |j, v| {
            j.metadata.resource_version = v;
        })
    }

    #[tracing::instrument(skip(self, jwt), fields(jwt = %jwt.metadata.namespaced_name()))]
    async fn update_jwt_status(&self, jwt: &Jwt) -> StoreResult<Jwt> {
        let name = jwt.metadata.namespaced_name();
        let mut map = self.jwts.write();
        let stored = map.get_mut(&name).ok_or_else(|| StoreError::not_found(KIND_JWT, &name))?;

        if stored.metadata.resource_version != jwt.metadata.resource_version {
            return Err(StoreError::conflict(KIND_JWT, &name));
        }

        stored.status = jwt.status.clone();
        stored.metadata.resource_version += 1;
        Ok(stored.clone())
    }

    #[tracing::instrument(skip(self), fields(secret = %name))]
    async fn get_secret(&self, name: &NamespacedName) -> StoreResult<Secret> {
        self.secrets
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(KIND_SECRET, name))
    }

    #[tracing::instrument(skip(self, secret), fields(secret = %secret.metadata.namespaced_name()))]
    async fn create_secret(&self, secret: &Secret) -> StoreResult<Secret> {
        create(&self.secrets, KIND_SECRET, secret.metadata.namespaced_name(), secret, |s, v| {
            s.metadata.resource_version = v;
        })
    }

    #[tracing::instrument(skip(self, secret), fields(secret = %secret.metadata.namespaced_name()))]
    async fn update_secret(&self, secret: &Secret) -> StoreResult<Secret> {
        let name = secret.metadata.namespaced_name();
        let mut map = self.secrets.write();
        let stored =
            map.get_mut(&name).ok_or_else(|| StoreError::not_found(KIND_SECRET, &name))?;

        if stored.metadata.resource_version != secret.metadata.resource_version {
            return Err(StoreError::conflict(KIND_SECRET, &name));
        }

        let mut updated = secret.clone();
        updated.metadata.resource_version += 1;
        *stored = updated.clone();
        Ok(updated)
    }
}

/// Shared create path: reject duplicates, stamp version 1.
fn create<T: Clone>(
    map: &RwLock<HashMap<NamespacedName, T>>,
    kind: &'static str,
    name: NamespacedName,
    object: &T,
    stamp: impl FnOnce(&mut T, u64),
) -> StoreResult<T> {
    let mut map = map.write();
    if map.contains_key(&name) {
        return Err(StoreError::AlreadyExists { kind, name });
    }

    let mut stored = object.clone();
    stamp(&mut stored, 1);
    map.insert(name, stored.clone());
    Ok(stored)
}
