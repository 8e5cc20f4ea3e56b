//! Error types shared by the cache, registry, and CLI crates

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for artifact store operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error during store operations
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(modelhub::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "rename")
        operation: String,
    },

    /// Configuration or environment error
    #[error("Configuration error: {message}")]
    #[diagnostic(code(modelhub::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Unknown model, version, or cache key
    #[error("Not found: {what}")]
    #[diagnostic(
        code(modelhub::not_found),
        help("The entry may have been deleted or never existed")
    )]
    NotFound {
        /// Description of what was not found
        what: String,
    },

    /// A stored blob's recomputed digest does not match its recorded digest
    #[error("Integrity violation for {what}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(modelhub::integrity),
        help("The blob was corrupted or tampered with after it was recorded")
    )]
    IntegrityViolation {
        /// Description of the blob that failed verification
        what: String,
        /// The recorded digest
        expected: String,
        /// The recomputed digest
        actual: String,
    },

    /// Operation rejected by an invariant (e.g., deleting the active version)
    #[error("Invalid operation: {message}")]
    #[diagnostic(code(modelhub::invalid_operation))]
    InvalidOperation {
        /// Error message describing why the operation was rejected
        message: String,
    },

    /// Blob or metadata could not be serialized or interpreted
    #[error("Serialization error: {message}")]
    #[diagnostic(code(modelhub::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },
}

impl Error {
    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create an integrity violation error
    #[must_use]
    pub fn integrity(
        what: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::IntegrityViolation {
            what: what.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid operation error
    #[must_use]
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: msg.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Stable machine-readable error kind, used in CLI response envelopes
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io_failure",
            Self::Configuration { .. } => "configuration",
            Self::NotFound { .. } => "not_found",
            Self::IntegrityViolation { .. } => "integrity_violation",
            Self::InvalidOperation { .. } => "invalid_operation",
            Self::Serialization { .. } => "serialization_error",
        }
    }
}

/// Result type for artifact store operations
pub type Result<T> = std::result::Result<T, Error>;
