//! Error types for the ArchiveKeep core
//!
//! This module defines all error types that can occur during comparison,
//! synchronization and verification. Errors are designed to be informative
//! and actionable: every error propagated out of an operation names the
//! operation and path that produced it.

use thiserror::Error;

/// Type alias for Results in the ArchiveKeep core
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Main error type for all ArchiveKeep operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Save or move target is already occupied; never merged or overwritten
    #[error("destination already exists: {path}")]
    DestinationExists {
        /// Occupied archive path
        path: String,
    },

    /// Requested file is not present in the archive
    #[error("file not found: {path}")]
    FileNotFound {
        /// Missing archive path
        path: String,
    },

    /// The archive driver does not support the requested capability
    #[error("archive does not support {0}")]
    CapabilityUnsupported(String),

    /// A sync decision was requested without the flag that enables it
    #[error("{0}")]
    PolicyViolation(String),

    /// Cancellation observed at a file boundary
    #[error("interrupted")]
    Interrupted,

    /// A verification job instance may only be executed once
    #[error("job has been already started")]
    JobAlreadyStarted,

    /// Stored content no longer matches its recorded checksum
    #[error("{reason}")]
    IntegrityFailure {
        /// What the check found, e.g. "file was modified"
        reason: String,
    },

    /// Wraps an inner error with the operation and path that produced it
    #[error("{context}: {source}")]
    Context {
        /// Operation description, e.g. "transfer file photos/a.jpg"
        context: String,
        /// The underlying failure
        #[source]
        source: Box<ArchiveError>,
    },
}

impl ArchiveError {
    /// Create a policy violation with a custom message
    pub fn policy(msg: impl Into<String>) -> Self {
        ArchiveError::PolicyViolation(msg.into())
    }

    /// Create an integrity failure with a custom reason
    pub fn integrity(reason: impl Into<String>) -> Self {
        ArchiveError::IntegrityFailure {
            reason: reason.into(),
        }
    }

    /// Wrap this error with the operation that produced it
    pub fn context(self, context: impl Into<String>) -> Self {
        ArchiveError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this error indicates corrupted stored content
    pub fn is_corruption(&self) -> bool {
        match self {
            ArchiveError::IntegrityFailure { .. } => true,
            ArchiveError::Context { source, .. } => source.is_corruption(),
            _ => false,
        }
    }
}

/// Extension adding operation context to any core `Result`
pub trait ResultExt<T> {
    /// Wrap the error, if any, with the operation that produced it
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }
}
