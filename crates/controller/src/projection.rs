//! Projection between a RotatingKey's published status and the rotation
//! engine's in-memory [`Keys`] record.
//!
//! The mapping is lossy in both directions: status only ever carries
//! public halves, and the private half lives solely in the associated
//! secret. Hydration therefore reads status and secret together.

use tokator_crypto::{
    codec,
    error::CryptoResult,
    rotation::{Keys, SigningKey, VerificationKey},
};

use crate::api::{
    RotatingKey, RotatingKeyStatus, Secret, SigningKeyStatus, VerificationKeyStatus,
};

/// Key use marker published for the active signing key.
pub const USE_SIGNING: &str = "sig";

// TODO: "enc" mislabels keys that verify signatures; the JWK use for them
// is "sig". Consumers already match on "enc", so changing it is a wire
// break to coordinate.
/// Key use marker published for retired verification keys.
pub const USE_VERIFICATION: &str = "enc";

/// Hydrates the engine's [`Keys`] record from a resource's status and its
/// key secret.
///
/// # Errors
///
/// Fails with a key material error if the secret payload is missing its
/// `private_key` entry, the private PEM is malformed, the spec algorithm
/// is unsupported, or any published verification PEM fails to decode. No
/// partially hydrated record is returned.
pub fn status_to_keys(key: &RotatingKey, secret: &Secret) -> CryptoResult<Keys> {
    let pem = codec::private_from_payload(&secret.string_data)?;
    let private_key = codec::decode_private(pem)?;
    let algorithm = key.spec.algorithm.parse()?;

    let mut verification_keys = Vec::with_capacity(key.status.verification_keys.len());
    for published in &key.status.verification_keys {
        verification_keys.push(VerificationKey {
            kid: published.key_id.clone(),
            public_key: codec::decode_public(&published.public_key)?,
            expires_at: published.expire_at,
        });
    }

    Ok(Keys {
        signing_key: Some(SigningKey {
            kid: key.status.signing_key.key_id.clone(),
            algorithm,
            private_key,
        }),
        verification_keys,
        // A status that has never recorded a rotation hydrates as due.
        next_rotation: key.status.next_rotation.unwrap_or(chrono::DateTime::UNIX_EPOCH),
    })
}

/// Projects the engine's [`Keys`] record back onto a publishable status.
///
/// # Errors
///
/// Fails with a key material error if a public half cannot be PEM-encoded.
pub fn keys_to_status(keys: &Keys) -> CryptoResult<RotatingKeyStatus> {
    let mut verification_keys = Vec::with_capacity(keys.verification_keys.len());
    for key in &keys.verification_keys {
        verification_keys.push(VerificationKeyStatus {
            key_id: key.kid.clone(),
            key_use: USE_VERIFICATION.to_owned(),
            public_key: codec::encode_public(&key.public_key)?,
            expire_at: key.expires_at,
        });
    }

    let signing_key = match &keys.signing_key {
        Some(signer) => SigningKeyStatus {
            key_id: signer.kid.clone(),
            key_use: USE_SIGNING.to_owned(),
            public_key: codec::encode_public(&signer.private_key.public_key())?,
        },
        None => SigningKeyStatus::default(),
    };

    Ok(RotatingKeyStatus {
        next_rotation: Some(keys.next_rotation),
        verification_keys,
        signing_key,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use tokator_crypto::{
        error::CryptoError,
        rotation::{Keys, Rotator},
        strategy::RotationStrategy,
    };

    use super::*;
    use crate::api::{NamespacedName, RotatingKeySpec};

    fn anchor() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn rotated_keys() -> Keys {
        let strategy =
            RotationStrategy::new("ES256", Duration::hours(1), Duration::hours(2)).unwrap();
        let rotator = Rotator::new(strategy);
        let first = rotator.rotate(Keys::empty(), anchor()).unwrap();
        rotator.rotate(first, anchor() + Duration::hours(1)).unwrap()
    }

    fn resource_with_status(status: RotatingKeyStatus) -> RotatingKey {
        let mut key = RotatingKey::new(
            &NamespacedName::new("default", "signer"),
            RotatingKeySpec {
                algorithm: "ES256".into(),
                rotate_after: "1h".into(),
                lifetime: "2h".into(),
            },
        );
        key.status = status;
        key
    }

    #[test]
    fn test_round_trip_preserves_kids_and_schedule() {
        let keys = rotated_keys();
        let status = keys_to_status(&keys).unwrap();

        assert_eq!(status.signing_key.key_use, "sig");
        assert_eq!(status.verification_keys.len(), 1);
        assert_eq!(status.verification_keys[0].key_use, "enc");
        assert_eq!(status.next_rotation, Some(keys.next_rotation));

        let resource = resource_with_status(status.clone());
        let pem = codec::encode_private(&keys.signing_key.as_ref().unwrap().private_key).unwrap();
        let secret = Secret::opaque(
            &NamespacedName::new("default", "signer"),
            codec::private_to_payload(&pem),
        );

        let hydrated = status_to_keys(&resource, &secret).unwrap();
        assert_eq!(
            hydrated.signing_key.as_ref().unwrap().kid,
            keys.signing_key.as_ref().unwrap().kid
        );
        assert_eq!(hydrated.verification_keys.len(), 1);
        assert_eq!(hydrated.verification_keys[0].kid, keys.verification_keys[0].kid);
        assert_eq!(hydrated.verification_keys[0].expires_at, keys.verification_keys[0].expires_at);
        assert_eq!(hydrated.next_rotation, keys.next_rotation);
    }

    #[test]
    fn test_missing_payload_entry_fails() {
        let resource = resource_with_status(RotatingKeyStatus::default());
        let secret = Secret::opaque(
            &NamespacedName::new("default", "signer"),
            std::collections::BTreeMap::new(),
        );

        let err = status_to_keys(&resource, &secret).unwrap_err();
        assert!(matches!(err, CryptoError::MissingPayloadKey(_)));
    }

    #[test]
    fn test_malformed_verifier_pem_fails() {
        let keys = rotated_keys();
        let mut status = keys_to_status(&keys).unwrap();
        status.verification_keys[0].public_key = "not a pem".into();

        let resource = resource_with_status(status);
        let pem = codec::encode_private(&keys.signing_key.as_ref().unwrap().private_key).unwrap();
        let secret = Secret::opaque(
            &NamespacedName::new("default", "signer"),
            codec::private_to_payload(&pem),
        );

        let err = status_to_keys(&resource, &secret).unwrap_err();
        assert!(matches!(err, CryptoError::BadFormat(_)));
    }

    #[test]
    fn test_unset_next_rotation_hydrates_as_due() {
        let keys = rotated_keys();
        let mut status = keys_to_status(&keys).unwrap();
        status.next_rotation = None;

        let resource = resource_with_status(status);
        let pem = codec::encode_private(&keys.signing_key.as_ref().unwrap().private_key).unwrap();
        let secret = Secret::opaque(
            &NamespacedName::new("default", "signer"),
            codec::private_to_payload(&pem),
        );

        let hydrated = status_to_keys(&resource, &secret).unwrap();
        assert!(hydrated.next_rotation < anchor());
    }
}
