//! # tokator key material
//!
//! Key generation, rotation, and token signing primitives for the tokator
//! controller.
//!
//! This crate provides:
//! - **Algorithm registry**: the supported signing algorithms and the
//!   single parsing point for algorithm labels
//! - **PEM codec**: private/public key serialization and the opaque
//!   secret payload layout
//! - **Rotation engine**: a pure transformer that installs a fresh
//!   signing key, demotes the previous one to verification-only, and
//!   evicts expired verifiers
//! - **Token signing**: compact JWS issuance and verification
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use tokator_crypto::rotation::{Keys, Rotator};
//! use tokator_crypto::strategy::RotationStrategy;
//!
//! # fn example() -> Result<(), tokator_crypto::error::CryptoError> {
//! let strategy = RotationStrategy::new("ES256", Duration::hours(24), Duration::hours(48))?;
//! let rotator = Rotator::new(strategy);
//!
//! // First rotation seeds a signer; later rotations demote it.
//! let keys = rotator.rotate(Keys::empty(), Utc::now())?;
//! assert!(keys.signing_key.is_some());
//! assert!(keys.verification_keys.is_empty());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Algorithm registry and validation.
pub mod algorithm;
/// PEM codec and secret payload packing.
pub mod codec;
/// Key material error types.
pub mod error;
/// Asymmetric key material variants.
pub mod material;
/// Key rotation engine.
pub mod rotation;
/// Rotation strategy record.
pub mod strategy;
/// Compact JWS signing and verification.
pub mod token;

// Re-export key types for convenience
pub use algorithm::{FORBIDDEN_ALGORITHMS, KeyAlgorithm, SUPPORTED_ALGORITHMS, validate_algorithm};
pub use codec::PRIVATE_KEY_PAYLOAD_KEY;
pub use error::{CryptoError, CryptoResult};
pub use material::{PrivateKeyMaterial, PublicKeyMaterial};
pub use rotation::{Keys, Rotator, SigningKey, VerificationKey, generate_kid};
pub use strategy::RotationStrategy;
pub use token::Claims;
