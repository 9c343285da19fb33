//! Firestore persistence for cycle records.
//!
//! Thin REST client (token cache, retries, metrics) plus the
//! [`CycleRepository`] used by the state recorder.

pub mod client;
pub mod cycle_repo;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use cycle_repo::{CycleRepository, CYCLES_COLLECTION};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use types::{Document, StructuredQuery, Value};
