//! Shared infrastructure for the modelhub artifact lifecycle subsystem
//!
//! This crate provides the pieces both stores are built on:
//! - A common error taxonomy with structured result returns
//! - The artifact serialization contract (opaque byte blobs)
//! - SHA-256 content hashing and blob integrity verification
//! - A file-locked, atomically-written JSON metadata store
//!
//! # Metadata ownership
//!
//! [`MetadataStore`] owns its on-disk JSON document exclusively. Callers
//! never hold an authoritative in-memory copy: every mutation re-reads the
//! document under an exclusive advisory lock, applies the change, and
//! atomically renames the rewritten file into place. Concurrent processes
//! mutating the same document therefore cannot lose each other's updates.

mod artifact;
mod error;
pub mod hash;
mod metadata;

pub use artifact::{Artifact, JsonArtifact};
pub use error::{Error, Result};
pub use metadata::{MetadataStore, write_atomic};
