//! Resource types managed by the controller.
//!
//! These mirror the `tokens.hexhibit.xyz/v1alpha1` wire schema: a
//! `RotatingKey` declares a periodically rotated asymmetric key pair, a
//! `Jwt` declares a bearer token refreshed from a referenced RotatingKey,
//! and an opaque `Secret` carries the private material for each. Field
//! names on the wire follow the resource manifests (`keyID`, `rotateAfter`,
//! `expireAt`, ...), hence the serde renames.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API group of the managed resource kinds.
pub const GROUP: &str = "tokens.hexhibit.xyz";
/// API version of the managed resource kinds.
pub const VERSION: &str = "v1alpha1";

/// Kind string for [`RotatingKey`].
pub const KIND_ROTATING_KEY: &str = "RotatingKey";
/// Kind string for [`Jwt`].
pub const KIND_JWT: &str = "Jwt";
/// Kind string for [`Secret`].
pub const KIND_SECRET: &str = "Secret";

/// Label set on secrets whose content this controller manages.
pub const CONTROLLED_LABEL: &str = "tokator.hexhibit.xyz/controlled";

/// Secret type for the secrets this controller writes.
pub const SECRET_TYPE_OPAQUE: &str = "Opaque";

/// A namespace-qualified resource name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedName {
    /// Namespace the resource lives in.
    pub namespace: String,
    /// Resource name within the namespace.
    pub name: String,
}

impl NamespacedName {
    /// Creates a namespaced name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A link asserting that a secondary object's lifecycle is tied to a
/// primary. The orchestration runtime cascades deletion along controller
/// references; this crate only asserts them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    /// `group/version` of the owning resource.
    pub api_version: String,
    /// Kind of the owning resource.
    pub kind: String,
    /// Name of the owning resource (same namespace as the owned object).
    pub name: String,
    /// Whether this owner is the managing controller.
    pub controller: bool,
}

/// Standard object metadata shared by all resource kinds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name.
    pub name: String,
    /// Resource namespace.
    pub namespace: String,
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Owners of this object; at most one entry has `controller: true`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    /// Monotonic version used for optimistic concurrency. Zero for
    /// objects that have never been persisted.
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    /// Metadata for a fresh (never persisted) object with the given name.
    #[must_use]
    pub fn named(name: &NamespacedName) -> Self {
        Self { name: name.name.clone(), namespace: name.namespace.clone(), ..Self::default() }
    }

    /// The object's namespaced name.
    #[must_use]
    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }

    /// Returns the controller owner reference, if one is set.
    #[must_use]
    pub fn controller_reference(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }
}

/// Ensures `owned` carries a controller reference to the named owner.
///
/// Returns `true` if the metadata was changed. An existing controller
/// reference to a different owner is replaced; asserting the same owner
/// twice is a no-op, so callers can run this before every write.
pub fn ensure_controller_reference(
    owned: &mut ObjectMeta,
    owner_kind: &str,
    owner_name: &str,
) -> bool {
    let wanted = OwnerReference {
        api_version: format!("{GROUP}/{VERSION}"),
        kind: owner_kind.to_owned(),
        name: owner_name.to_owned(),
        controller: true,
    };

    match owned.owner_references.iter_mut().find(|r| r.controller) {
        Some(existing) if *existing == wanted => false,
        Some(existing) => {
            *existing = wanted;
            true
        },
        None => {
            owned.owner_references.push(wanted);
            true
        },
    }
}

/// An opaque secret holding private key or token material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// Standard metadata.
    pub metadata: ObjectMeta,
    /// Secret type; this controller only writes [`SECRET_TYPE_OPAQUE`].
    #[serde(rename = "type")]
    pub secret_type: String,
    /// String-keyed payload.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, String>,
}

impl Secret {
    /// Creates an opaque secret with the given payload.
    #[must_use]
    pub fn opaque(name: &NamespacedName, string_data: BTreeMap<String, String>) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            secret_type: SECRET_TYPE_OPAQUE.to_owned(),
            string_data,
        }
    }
}

/// Desired state of a [`RotatingKey`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotatingKeySpec {
    /// Signing algorithm label (for example `RS256`).
    pub algorithm: String,
    /// Rotation period as a duration string (for example `"24h"`).
    pub rotate_after: String,
    /// Post-demotion verification grace window, equivalently the maximum
    /// validity of any token signed under a retired key.
    pub lifetime: String,
}

/// Public half of the active signing key, as published on status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKeyStatus {
    /// Key ID of the active signing key.
    #[serde(rename = "keyID", default)]
    pub key_id: String,
    /// Key use marker; `"sig"` for the signing key.
    #[serde(rename = "use", default)]
    pub key_use: String,
    /// PEM-encoded public key.
    #[serde(rename = "publicKey", default)]
    pub public_key: String,
}

/// A retired signing key still published for signature verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationKeyStatus {
    /// Key ID carried over from the key's signing days.
    #[serde(rename = "keyID")]
    pub key_id: String,
    /// Key use marker.
    #[serde(rename = "use")]
    pub key_use: String,
    /// PEM-encoded public key.
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// Instant after which the key is no longer published.
    #[serde(rename = "expireAt")]
    pub expire_at: DateTime<Utc>,
}

/// Observed state of a [`RotatingKey`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotatingKeyStatus {
    /// The next time the signing key rotates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_rotation: Option<DateTime<Utc>>,
    /// Retired keys still valid for verification, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verification_keys: Vec<VerificationKeyStatus>,
    /// Public half of the active signing key.
    #[serde(default)]
    pub signing_key: SigningKeyStatus,
}

/// A periodically rotated asymmetric key pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatingKey {
    /// Standard metadata.
    pub metadata: ObjectMeta,
    /// Desired state.
    pub spec: RotatingKeySpec,
    /// Observed state.
    #[serde(default)]
    pub status: RotatingKeyStatus,
}

impl RotatingKey {
    /// Creates a new resource with empty status.
    #[must_use]
    pub fn new(name: &NamespacedName, spec: RotatingKeySpec) -> Self {
        Self { metadata: ObjectMeta::named(name), spec, status: RotatingKeyStatus::default() }
    }
}

/// Reference from a [`Jwt`] to the [`RotatingKey`] that signs it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatingKeyRef {
    /// Name of the referenced RotatingKey.
    pub name: String,
    /// Namespace of the referenced RotatingKey.
    pub namespace: String,
}

impl RotatingKeyRef {
    /// The reference as a namespaced name.
    #[must_use]
    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }
}

/// Desired state of a [`Jwt`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtSpec {
    /// Subject claim embedded in the token.
    pub subject: String,
    /// The key that signs this token.
    pub rotating_key_ref: RotatingKeyRef,
}

/// Observed state of a [`Jwt`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtStatus {
    /// Algorithm of the key the token was last signed with.
    #[serde(default)]
    pub algorithm: String,
    /// Token lifetime as a duration string.
    #[serde(default)]
    pub lifetime: String,
    /// Set to force a refresh on the next reconcile.
    #[serde(default)]
    pub expired: bool,
    /// When the current token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// When the token becomes due for refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_after: Option<DateTime<Utc>>,
    /// When the token material was last rewritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<DateTime<Utc>>,
    /// When the controller wants to be woken next.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_reconcile: Option<DateTime<Utc>>,
    /// Last time the status changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// Whether the token secret is populated and current.
    #[serde(default)]
    pub ready: bool,
}

/// A signed bearer token refreshed before expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwt {
    /// Standard metadata.
    pub metadata: ObjectMeta,
    /// Desired state.
    pub spec: JwtSpec,
    /// Observed state.
    #[serde(default)]
    pub status: JwtStatus,
}

impl Jwt {
    /// Creates a new resource with empty status.
    #[must_use]
    pub fn new(name: &NamespacedName, spec: JwtSpec) -> Self {
        Self { metadata: ObjectMeta::named(name), spec, status: JwtStatus::default() }
    }
}
