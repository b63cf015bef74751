//! Error types for the marksnap library
//!
//! This module defines every error that can surface from snapshot persistence.
//! The taxonomy follows how each failure is handled:
//!
//! - **Absorbed locally**: [`SnapshotError::FieldCapture`] and
//!   [`SnapshotError::CatalogUnavailable`] are recorded in reports and logged,
//!   never propagated through the save/load control flow.
//! - **Surfaced as "snapshot unreadable"**: encode/decode failures and
//!   unsupported format versions.
//! - **Surfaced as "could not save/load"**: I/O failures.
//! - **Triggers the degraded path**: [`SnapshotError::NotFound`].

use crate::types::StateField;
use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the marksnap library
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Main error type for all marksnap operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors while reading or writing configuration and catalog files
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// One field of the live document could not be read
    #[error("Could not capture {field}: {reason}")]
    FieldCapture {
        /// Field that failed
        field: StateField,
        /// Reason reported by the document
        reason: String,
    },

    /// A project state could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Snapshot bytes are malformed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Snapshot was written by a schema this build does not understand
    #[error("Unsupported snapshot format version: {0}")]
    UnsupportedVersion(String),

    /// Decoded snapshot failed validation
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// No snapshot exists for the requested project
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// The external project catalog is not ready
    #[error("Project catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Writing restored state into the live document failed
    #[error("Could not apply {field}: {reason}")]
    Apply {
        /// Field that failed
        field: StateField,
        /// Reason reported by the document
        reason: String,
    },

    /// Project name cannot be turned into a file name
    #[error("Invalid project name: {0:?}")]
    InvalidProjectName(String),

    /// Project directory is not usable
    #[error("Project directory unusable: {0:?}")]
    ProjectDirectory(PathBuf),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Compression errors
    #[error("Compression error: {0}")]
    Compression(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tempfile::PersistError> for SnapshotError {
    fn from(err: tempfile::PersistError) -> Self {
        SnapshotError::Io(err.error)
    }
}

impl SnapshotError {
    /// Create a decode error with a custom message
    pub fn decode(msg: impl Into<String>) -> Self {
        SnapshotError::Decode(msg.into())
    }

    /// Create an encode error with a custom message
    pub fn encode(msg: impl Into<String>) -> Self {
        SnapshotError::Encode(msg.into())
    }

    /// Create a compression error with a custom message
    pub fn compression(msg: impl Into<String>) -> Self {
        SnapshotError::Compression(msg.into())
    }

    /// Create a catalog-unavailable error with a custom message
    pub fn catalog_unavailable(msg: impl Into<String>) -> Self {
        SnapshotError::CatalogUnavailable(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        SnapshotError::Internal(msg.into())
    }

    /// Check if this error means "no snapshot for that name"
    pub fn is_not_found(&self) -> bool {
        matches!(self, SnapshotError::NotFound(_))
    }

    /// Check if this error means the snapshot bytes cannot be trusted
    pub fn is_unreadable(&self) -> bool {
        matches!(
            self,
            SnapshotError::Decode(_)
                | SnapshotError::UnsupportedVersion(_)
                | SnapshotError::InvalidSnapshot(_)
        )
    }

    /// Check if this error is absorbed by the engine rather than surfaced
    pub fn is_absorbed(&self) -> bool {
        matches!(
            self,
            SnapshotError::FieldCapture { .. } | SnapshotError::CatalogUnavailable(_)
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            SnapshotError::NotFound(name) => {
                format!("No saved snapshot exists for project '{}'.", name)
            }
            SnapshotError::Decode(_)
            | SnapshotError::UnsupportedVersion(_)
            | SnapshotError::InvalidSnapshot(_) => {
                format!("The snapshot is unreadable: {}", self)
            }
            SnapshotError::Io(e) => {
                format!("Could not save or load the project: {}", e)
            }
            SnapshotError::CatalogUnavailable(_) => {
                "The project catalog is not available; the project list may be incomplete."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}
