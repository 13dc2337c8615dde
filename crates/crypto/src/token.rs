//! Compact JWS signing and verification.
//!
//! The RS-family algorithms sign and verify through `jsonwebtoken`. The
//! ES-family algorithms use P-521 keys, which sit outside `jsonwebtoken`'s
//! supported set, so the ES path assembles and checks the compact JWS
//! manually: base64url(header) `.` base64url(claims) `.` base64url(r ‖ s),
//! signed with ECDSA over the curve's native SHA-512 digest.
//!
//! Expiry is checked against a caller-supplied instant rather than the
//! wall clock, so verification composes with an injected clock.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use p521::ecdsa::{
    Signature as EcSignature, SigningKey as EcSigningKey, VerifyingKey as EcVerifyingKey,
    signature::{Signer, Verifier},
};
use p521::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};

use crate::{
    algorithm::KeyAlgorithm,
    codec,
    error::{CryptoError, CryptoResult},
    material::{PrivateKeyMaterial, PublicKeyMaterial},
    rotation::SigningKey,
};

/// Claims carried by issued tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject the token was issued for.
    pub sub: String,
    /// Issued-at (seconds since epoch).
    pub iat: i64,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
    /// Not-before (optional, seconds since epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl Claims {
    /// Builds the claim set for a token issued at `issued_at` and expiring
    /// at `expires_at`.
    #[must_use]
    pub fn new(subject: &str, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: subject.to_owned(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            nbf: None,
        }
    }
}

/// JWS header fields this crate reads back out of tokens.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenHeader {
    /// Algorithm label, exactly as written by the signer.
    pub alg: String,
    /// Key ID of the signing key.
    #[serde(default)]
    pub kid: Option<String>,
    /// Token type, normally `"JWT"`.
    #[serde(default)]
    pub typ: Option<String>,
}

/// Decodes the JWS header without verifying the signature.
///
/// Unlike `jsonwebtoken::decode_header`, this accepts `alg` labels outside
/// `jsonwebtoken`'s own enum (ES512 in particular), which is why the header
/// is parsed by hand.
///
/// # Errors
///
/// Returns [`CryptoError::Verification`] if the token does not have three
/// dot-separated parts or the header is not valid base64url JSON.
pub fn decode_header(token: &str) -> CryptoResult<TokenHeader> {
    let parts = split_token(token)?;
    let header_bytes = URL_SAFE_NO_PAD
        .decode(parts[0])
        .map_err(|e| CryptoError::Verification(format!("failed to decode JWS header: {e}")))?;
    serde_json::from_slice(&header_bytes)
        .map_err(|e| CryptoError::Verification(format!("failed to parse JWS header: {e}")))
}

/// Signs `claims` with `key`, producing a compact JWS.
///
/// The header carries the key's algorithm label, its kid, and
/// `typ: "JWT"`.
///
/// # Errors
///
/// Returns [`CryptoError::Signing`] if the key material does not match the
/// key's algorithm family or the signing operation fails.
pub fn sign(key: &SigningKey, claims: &Claims) -> CryptoResult<String> {
    match (&key.private_key, jwt_algorithm(key.algorithm)) {
        (PrivateKeyMaterial::Rsa(_), Some(alg)) => {
            let pem = codec::encode_private(&key.private_key)
                .map_err(|e| CryptoError::Signing(e.to_string()))?;
            let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| CryptoError::Signing(e.to_string()))?;
            let header = Header { kid: Some(key.kid.clone()), ..Header::new(alg) };
            jsonwebtoken::encode(&header, claims, &encoding_key)
                .map_err(|e| CryptoError::Signing(e.to_string()))
        },
        (PrivateKeyMaterial::Ec(secret), None) => {
            let header = serde_json::json!({
                "typ": "JWT",
                "alg": key.algorithm.label(),
                "kid": key.kid,
            });
            let header_b64 = URL_SAFE_NO_PAD.encode(
                serde_json::to_vec(&header)
                    .map_err(|e| CryptoError::Signing(e.to_string()))?,
            );
            let claims_b64 = URL_SAFE_NO_PAD.encode(
                serde_json::to_vec(claims).map_err(|e| CryptoError::Signing(e.to_string()))?,
            );
            let signing_input = format!("{header_b64}.{claims_b64}");

            let signing_key = EcSigningKey::from_bytes(&secret.to_bytes())
                .map_err(|e| CryptoError::Signing(e.to_string()))?;
            let signature: EcSignature = signing_key.sign(signing_input.as_bytes());
            let signature_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

            Ok(format!("{signing_input}.{signature_b64}"))
        },
        _ => Err(CryptoError::Signing(format!(
            "key material does not match algorithm {}",
            key.algorithm
        ))),
    }
}

/// Verifies a compact JWS against `public_key` and returns its claims.
///
/// The token's `alg` header must equal the expected algorithm's label, the
/// signature must check out against the public key, and `exp` must lie
/// strictly after `now`.
///
/// # Errors
///
/// Returns [`CryptoError::Verification`] for malformed tokens, label or
/// key-family mismatches, bad signatures, and expired tokens.
pub fn verify(
    token: &str,
    algorithm: KeyAlgorithm,
    public_key: &PublicKeyMaterial,
    now: DateTime<Utc>,
) -> CryptoResult<Claims> {
    let parts = split_token(token)?;

    let header = decode_header(token)?;
    if header.alg != algorithm.label() {
        return Err(CryptoError::Verification(format!(
            "token algorithm '{}' does not match expected '{}'",
            header.alg, algorithm
        )));
    }

    let claims = match (public_key, jwt_algorithm(algorithm)) {
        (PublicKeyMaterial::Rsa(_), Some(alg)) => {
            let pem = codec::encode_public(public_key)
                .map_err(|e| CryptoError::Verification(e.to_string()))?;
            let decoding_key = DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| CryptoError::Verification(e.to_string()))?;

            let mut validation = Validation::new(alg);
            // Expiry is checked below against the injected instant, not
            // the wall clock jsonwebtoken would consult.
            validation.validate_exp = false;
            validation.validate_aud = false;
            validation.required_spec_claims = Default::default();

            jsonwebtoken::decode::<Claims>(token, &decoding_key, &validation)
                .map_err(|e| CryptoError::Verification(e.to_string()))?
                .claims
        },
        (PublicKeyMaterial::Ec(point), None) => {
            let signing_input_len = parts[0].len() + 1 + parts[1].len();
            let signing_input = &token[..signing_input_len];

            let signature_bytes = URL_SAFE_NO_PAD.decode(parts[2]).map_err(|e| {
                CryptoError::Verification(format!("failed to decode signature: {e}"))
            })?;
            let signature = EcSignature::from_slice(&signature_bytes)
                .map_err(|e| CryptoError::Verification(format!("malformed signature: {e}")))?;

            let verifying_key = EcVerifyingKey::from_encoded_point(&point.to_encoded_point(false))
                .map_err(|e| CryptoError::Verification(format!("malformed public key: {e}")))?;
            verifying_key
                .verify(signing_input.as_bytes(), &signature)
                .map_err(|_| CryptoError::Verification("invalid signature".into()))?;

            let claims_bytes = URL_SAFE_NO_PAD.decode(parts[1]).map_err(|e| {
                CryptoError::Verification(format!("failed to decode claims: {e}"))
            })?;
            serde_json::from_slice(&claims_bytes)
                .map_err(|e| CryptoError::Verification(format!("failed to parse claims: {e}")))?
        },
        _ => {
            return Err(CryptoError::Verification(format!(
                "key material does not match algorithm {algorithm}"
            )));
        },
    };

    if claims.exp <= now.timestamp() {
        return Err(CryptoError::Verification("token expired".into()));
    }

    Ok(claims)
}

/// Splits a compact JWS into its three parts.
fn split_token(token: &str) -> CryptoResult<[&str; 3]> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(claims), Some(signature), None) => Ok([header, claims, signature]),
        _ => Err(CryptoError::Verification(
            "JWS must have 3 parts separated by dots".into(),
        )),
    }
}

/// Maps RS-family algorithms onto `jsonwebtoken`'s enum; the ES family
/// returns `None` and takes the manual P-521 path.
fn jwt_algorithm(algorithm: KeyAlgorithm) -> Option<Algorithm> {
    match algorithm {
        KeyAlgorithm::Rs256 => Some(Algorithm::RS256),
        KeyAlgorithm::Rs384 => Some(Algorithm::RS384),
        KeyAlgorithm::Rs512 => Some(Algorithm::RS512),
        KeyAlgorithm::Es256 | KeyAlgorithm::Es384 | KeyAlgorithm::Es512 => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::rotation::generate_kid;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn test_key(algorithm: KeyAlgorithm) -> SigningKey {
        SigningKey {
            kid: generate_kid(),
            algorithm,
            private_key: algorithm.generate().expect("generation should succeed"),
        }
    }

    #[test]
    fn test_rsa_sign_verify_round_trip() {
        let now = anchor();
        let key = test_key(KeyAlgorithm::Rs256);
        let claims = Claims::new("alice", now, now + Duration::minutes(10));

        let token = sign(&key, &claims).expect("signing should succeed");
        let verified =
            verify(&token, KeyAlgorithm::Rs256, &key.private_key.public_key(), now).unwrap();

        assert_eq!(verified, claims);
    }

    #[test]
    fn test_ec_sign_verify_round_trip() {
        let now = anchor();
        let key = test_key(KeyAlgorithm::Es256);
        let claims = Claims::new("bob", now, now + Duration::minutes(10));

        let token = sign(&key, &claims).expect("signing should succeed");
        let verified =
            verify(&token, KeyAlgorithm::Es256, &key.private_key.public_key(), now).unwrap();

        assert_eq!(verified, claims);
    }

    #[test]
    fn test_header_carries_label_and_kid() {
        let now = anchor();
        for algorithm in [KeyAlgorithm::Rs256, KeyAlgorithm::Es512] {
            let key = test_key(algorithm);
            let claims = Claims::new("carol", now, now + Duration::minutes(5));
            let token = sign(&key, &claims).unwrap();

            let header = decode_header(&token).unwrap();
            assert_eq!(header.alg, algorithm.label());
            assert_eq!(header.kid.as_deref(), Some(key.kid.as_str()));
            assert_eq!(header.typ.as_deref(), Some("JWT"));
        }
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let now = anchor();
        let key = test_key(KeyAlgorithm::Es256);
        let other = test_key(KeyAlgorithm::Es256);
        let claims = Claims::new("dave", now, now + Duration::minutes(5));

        let token = sign(&key, &claims).unwrap();
        let result = verify(&token, KeyAlgorithm::Es256, &other.private_key.public_key(), now);
        assert!(matches!(result, Err(CryptoError::Verification(_))));
    }

    #[test]
    fn test_verify_rejects_tampered_claims() {
        let now = anchor();
        let key = test_key(KeyAlgorithm::Es256);
        let claims = Claims::new("erin", now, now + Duration::minutes(5));
        let token = sign(&key, &claims).unwrap();

        let forged = Claims::new("mallory", now, now + Duration::minutes(5));
        let forged_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged_b64, parts[2]);

        let result = verify(&tampered, KeyAlgorithm::Es256, &key.private_key.public_key(), now);
        assert!(matches!(result, Err(CryptoError::Verification(_))));
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let now = anchor();
        let key = test_key(KeyAlgorithm::Es256);
        let claims = Claims::new("frank", now, now + Duration::minutes(10));
        let token = sign(&key, &claims).unwrap();

        let later = now + Duration::minutes(10);
        let result = verify(&token, KeyAlgorithm::Es256, &key.private_key.public_key(), later);
        assert!(
            matches!(result, Err(CryptoError::Verification(ref msg)) if msg.contains("expired"))
        );
    }

    #[test]
    fn test_verify_rejects_label_mismatch() {
        let now = anchor();
        let key = test_key(KeyAlgorithm::Es256);
        let claims = Claims::new("grace", now, now + Duration::minutes(5));
        let token = sign(&key, &claims).unwrap();

        // Same key material family, different declared label.
        let result = verify(&token, KeyAlgorithm::Es384, &key.private_key.public_key(), now);
        assert!(
            matches!(result, Err(CryptoError::Verification(ref msg)) if msg.contains("does not match"))
        );
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        assert!(decode_header("only.two").is_err());
        assert!(decode_header("a.b.c.d").is_err());
        assert!(decode_header("!!!.!!!.!!!").is_err());
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        fn arb_claims() -> impl Strategy<Value = Claims> {
            (
                "[a-zA-Z0-9:_-]{1,64}",
                1_000_000_000i64..2_000_000_000i64,
                1_000_000_000i64..2_000_000_000i64,
                proptest::option::of(1_000_000_000i64..2_000_000_000i64),
            )
                .prop_map(|(sub, iat, exp, nbf)| Claims { sub, iat, exp, nbf })
        }

        proptest! {
            /// Serializing then deserializing any claim set must produce
            /// an identical struct.
            #[test]
            fn claims_serde_round_trip(claims in arb_claims()) {
                let json = serde_json::to_string(&claims).expect("serialize should succeed");
                let deserialized: Claims =
                    serde_json::from_str(&json).expect("deserialize should succeed");
                prop_assert_eq!(deserialized, claims);
            }

            /// `nbf` must not appear in the JSON when it is `None`.
            #[test]
            fn claims_none_nbf_omitted(claims in arb_claims()) {
                let json = serde_json::to_string(&claims).expect("serialize should succeed");
                let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
                if claims.nbf.is_none() {
                    prop_assert!(parsed.get("nbf").is_none());
                }
            }
        }
    }
}
