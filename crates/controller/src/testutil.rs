//! Shared test utilities for controller testing.
//!
//! This module provides helpers for constructing resources, a seeded
//! store, and a frozen clock. It is feature-gated behind `testutil` to
//! prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! tokator-controller = { path = "../controller", features = ["testutil"] }
//! ```

use chrono::{DateTime, TimeZone, Utc};

use crate::{
    api::{Jwt, JwtSpec, NamespacedName, RotatingKey, RotatingKeyRef, RotatingKeySpec},
    clock::ManualClock,
};

/// A fixed instant for deterministic schedules: 2024-05-01 12:00:00 UTC.
#[must_use]
pub fn anchor_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// A clock frozen at [`anchor_time`].
#[must_use]
pub fn anchored_clock() -> ManualClock {
    ManualClock::at(anchor_time())
}

/// Builds a RotatingKey resource with the given schedule.
#[must_use]
pub fn rotating_key(name: &NamespacedName, algorithm: &str, rotate_after: &str, lifetime: &str) -> RotatingKey {
    RotatingKey::new(
        name,
        RotatingKeySpec {
            algorithm: algorithm.to_owned(),
            rotate_after: rotate_after.to_owned(),
            lifetime: lifetime.to_owned(),
        },
    )
}

/// Builds a Jwt resource referencing the given RotatingKey.
#[must_use]
pub fn jwt(name: &NamespacedName, subject: &str, key_name: &NamespacedName) -> Jwt {
    Jwt::new(
        name,
        JwtSpec {
            subject: subject.to_owned(),
            rotating_key_ref: RotatingKeyRef {
                name: key_name.name.clone(),
                namespace: key_name.namespace.clone(),
            },
        },
    )
}
