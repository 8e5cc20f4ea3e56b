//! Model version registry for modelhub
//!
//! Tracks an ordered history of immutable version records per model, with
//! exactly one active version, integrity-verified reads, rollback, and
//! safe deletion.
//!
//! # Version lifecycle
//!
//! ```text
//! Created -> Active -> Inactive -> Active (rollback)
//!                          |
//!                          +-> Deleted
//! ```
//!
//! `Active -> Deleted` is forbidden: the active version must be rolled
//! back first. Version numbers are strictly increasing and never reused,
//! even after deletion, so external references (audit logs, experiment
//! reports) stay valid forever.
//!
//! Unlike the cache, the registry never degrades silently: integrity and
//! invariant violations always surface, because a wrong active version
//! can propagate bad predictions.

mod registry;

pub use registry::{
    CreateVersion, DeleteOutcome, ModelEntry, ModelVersions, NumericDelta, RegistryDoc,
    RollbackOutcome, VersionComparison, VersionRecord, VersionRegistry, VersionSummary,
};
