//! Token-bucket admission control.
//!
//! Every request passes through the [`AdmissionController`] before any other
//! work happens. Budgets are tracked per [`AdmissionKey`] (route, optionally
//! narrowed to a client) in a [`BucketStore`] whose read-modify-write is
//! atomic per key, so concurrent handlers sharing a key never under-count
//! denials.

pub mod bucket;
pub mod controller;
pub mod pruner;
pub mod store;

pub use bucket::{BucketConfig, BucketState};
pub use controller::{AdmissionController, AdmissionKey, AdmissionPolicy};
pub use pruner::BucketPruner;
pub use store::{BucketStore, DashMapBucketStore};
