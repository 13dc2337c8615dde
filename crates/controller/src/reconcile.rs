//! Reconcile outcome and error types.

use std::time::Duration;

use thiserror::Error;
use tokator_crypto::error::CryptoError;

use crate::{api::NamespacedName, store::StoreError};

/// What the runtime should do after a successful reconcile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Re-enqueue the resource after this delay; `None` means no
    /// scheduled wake-up (the next watch event drives the next pass).
    pub requeue_after: Option<Duration>,
}

impl ReconcileOutcome {
    /// No scheduled requeue.
    #[must_use]
    pub fn done() -> Self {
        Self { requeue_after: None }
    }

    /// Requeue after the given delay.
    #[must_use]
    pub fn after(delay: Duration) -> Self {
        Self { requeue_after: Some(delay) }
    }
}

/// Errors surfaced from a reconcile pass.
///
/// Every variant names the resource being reconciled; the runtime logs
/// the error and retries with backoff. Reconciles never panic on
/// recoverable input — malformed stored material is an error, not a
/// crash.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]` — new variants may be added in
/// future minor releases without a semver-breaking change.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReconcileError {
    /// An object store operation failed.
    #[error("store operation failed for {kind} '{resource}': {source}")]
    Store {
        /// Kind of the resource being reconciled.
        kind: &'static str,
        /// The resource being reconciled.
        resource: NamespacedName,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// Key material could not be generated, decoded, or used.
    #[error("key material error for {kind} '{resource}': {source}")]
    Crypto {
        /// Kind of the resource being reconciled.
        kind: &'static str,
        /// The resource being reconciled.
        resource: NamespacedName,
        /// The underlying key material error.
        #[source]
        source: CryptoError,
    },

    /// A duration string in the resource spec could not be parsed.
    #[error("invalid duration '{value}' for {field} of {kind} '{resource}'")]
    BadDuration {
        /// Kind of the resource being reconciled.
        kind: &'static str,
        /// The resource being reconciled.
        resource: NamespacedName,
        /// Which spec field held the bad value.
        field: &'static str,
        /// The offending value.
        value: String,
    },
}

impl ReconcileError {
    /// Wraps a store error with the reconciled resource.
    #[must_use]
    pub fn store(kind: &'static str, resource: &NamespacedName, source: StoreError) -> Self {
        ReconcileError::Store { kind, resource: resource.clone(), source }
    }

    /// Wraps a key material error with the reconciled resource.
    #[must_use]
    pub fn crypto(kind: &'static str, resource: &NamespacedName, source: CryptoError) -> Self {
        ReconcileError::Crypto { kind, resource: resource.clone(), source }
    }

    /// Builds a bad-duration error.
    #[must_use]
    pub fn bad_duration(
        kind: &'static str,
        resource: &NamespacedName,
        field: &'static str,
        value: &str,
    ) -> Self {
        ReconcileError::BadDuration {
            kind,
            resource: resource.clone(),
            field,
            value: value.to_owned(),
        }
    }
}

/// Result type alias for reconcile passes.
pub type ReconcileResult = Result<ReconcileOutcome, ReconcileError>;

/// Parses a duration string from a resource spec field.
pub(crate) fn parse_duration_field(
    kind: &'static str,
    resource: &NamespacedName,
    field: &'static str,
    value: &str,
) -> Result<chrono::Duration, ReconcileError> {
    humantime::parse_duration(value)
        .ok()
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .ok_or_else(|| ReconcileError::bad_duration(kind, resource, field, value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::api::KIND_ROTATING_KEY;

    #[test]
    fn test_error_names_the_resource() {
        let name = NamespacedName::new("default", "signer");
        let err = ReconcileError::store(
            KIND_ROTATING_KEY,
            &name,
            StoreError::not_found(KIND_ROTATING_KEY, &name),
        );
        assert_eq!(
            err.to_string(),
            "store operation failed for RotatingKey 'default/signer': RotatingKey 'default/signer' not found"
        );
    }

    #[test]
    fn test_bad_duration_message() {
        let name = NamespacedName::new("default", "signer");
        let err = ReconcileError::bad_duration(KIND_ROTATING_KEY, &name, "rotateAfter", "soon");
        assert_eq!(
            err.to_string(),
            "invalid duration 'soon' for rotateAfter of RotatingKey 'default/signer'"
        );
    }

    #[test]
    fn test_source_chain_preserved() {
        use std::error::Error;

        let name = NamespacedName::new("default", "signer");
        let err = ReconcileError::crypto(
            KIND_ROTATING_KEY,
            &name,
            CryptoError::MissingPayloadKey("private_key"),
        );
        let source = err.source().expect("source chain must be preserved");
        assert_eq!(source.to_string(), "secret payload missing 'private_key' entry");
    }

    #[test]
    fn test_outcome_constructors() {
        assert_eq!(ReconcileOutcome::done().requeue_after, None);
        assert_eq!(
            ReconcileOutcome::after(Duration::from_secs(5)).requeue_after,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_parse_duration_field() {
        let name = NamespacedName::new("default", "signer");
        let parsed =
            parse_duration_field(KIND_ROTATING_KEY, &name, "rotateAfter", "24h").unwrap();
        assert_eq!(parsed, chrono::Duration::hours(24));

        let err =
            parse_duration_field(KIND_ROTATING_KEY, &name, "rotateAfter", "soon").unwrap_err();
        assert!(matches!(err, ReconcileError::BadDuration { field: "rotateAfter", .. }));
    }
}
