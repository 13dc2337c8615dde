//! # tokator controller
//!
//! Declarative lifecycle management for rotating signing keys and the
//! bearer tokens they sign.
//!
//! Two resource kinds are reconciled:
//! - **RotatingKey**: an asymmetric key pair that rotates on a declared
//!   period, retaining retired public keys for verification during a
//!   bounded grace window
//! - **Jwt**: a signed bearer token refreshed before expiry using a
//!   referenced RotatingKey
//!
//! The reconcilers are plain structs over two injected capabilities: an
//! [`ObjectStore`](store::ObjectStore) for persistence and a
//! [`Clock`](clock::Clock) for time. The orchestration runtime that
//! watches resources, dispatches reconciles, and honors the returned
//! requeue delays lives outside this crate; so does the store's
//! production backend. [`MemoryObjectStore`](store::MemoryObjectStore)
//! serves tests and development.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tokator_controller::api::{NamespacedName, RotatingKey, RotatingKeySpec};
//! use tokator_controller::clock::SystemClock;
//! use tokator_controller::rotating_key::RotatingKeyReconciler;
//! use tokator_controller::store::{MemoryObjectStore, ObjectStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryObjectStore::new());
//! let name = NamespacedName::new("default", "signer");
//! store
//!     .create_rotating_key(&RotatingKey::new(
//!         &name,
//!         RotatingKeySpec {
//!             algorithm: "RS256".into(),
//!             rotate_after: "24h".into(),
//!             lifetime: "48h".into(),
//!         },
//!     ))
//!     .await?;
//!
//! let reconciler = RotatingKeyReconciler::new(store.clone(), Arc::new(SystemClock));
//! let outcome = reconciler.reconcile(&name).await?;
//! assert!(outcome.requeue_after.is_some());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Resource types and metadata.
pub mod api;
/// Injected time source.
pub mod clock;
/// Reconciler configuration.
pub mod config;
/// Jwt reconciler.
pub mod jwt;
/// Status ⇄ engine projection for RotatingKey.
pub mod projection;
/// Reconcile outcome and error types.
pub mod reconcile;
/// RotatingKey reconciler.
pub mod rotating_key;
/// Object store abstraction and in-memory implementation.
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

// Re-export primary types at crate root for convenience
pub use api::{Jwt, NamespacedName, RotatingKey, Secret};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ReconcilerConfig;
pub use jwt::JwtReconciler;
pub use reconcile::{ReconcileError, ReconcileOutcome, ReconcileResult};
pub use rotating_key::RotatingKeyReconciler;
pub use store::{MemoryObjectStore, ObjectStore, StoreError, StoreResult};
