//! Error types for the dumpfs library
//!
//! Two families of failure exist during a backup run:
//!
//! - [`DumpfsError`] is returned from the public entry points. It covers
//!   pre-flight configuration problems (nothing has been touched on disk yet)
//!   and fatal I/O failures that make a meaningful snapshot impossible.
//! - [`EntryFailure`] describes a single entry that could not be placed or
//!   updated. These are recoverable: the walker hands them to a
//!   [`Reporter`](crate::report::Reporter) and keeps going, so they never
//!   surface as an `Err` from [`Dumpfs::backup`](crate::Dumpfs::backup).

use crate::ops::Operation;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the dumpfs library
pub type Result<T> = std::result::Result<T, DumpfsError>;

/// Main error type for all dumpfs operations
#[derive(Debug, Error)]
pub enum DumpfsError {
    /// The destination root does not exist
    #[error("Destination not found: {0:?}")]
    DestinationNotFound(PathBuf),

    /// The destination root exists but is not a directory
    #[error("Destination is not a directory: {0:?}")]
    DestinationNotDirectory(PathBuf),

    /// A source root does not exist
    #[error("Source not found: {0:?}")]
    SourceNotFound(PathBuf),

    /// A source root exists but is not a directory
    #[error("Source is not a directory: {0:?}")]
    SourceNotDirectory(PathBuf),

    /// No source roots were given
    #[error("No source directories given")]
    NoSources,

    /// The new snapshot root could not be created
    #[error("Cannot create snapshot {path:?}: {source}")]
    SnapshotCreation {
        /// Snapshot directory that was being created
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The mirror of a source root could not be created inside the snapshot
    #[error("Cannot create {path:?} inside the snapshot: {source}")]
    SourceRootCreation {
        /// Destination directory that was being created
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O errors outside the per-entry walk (locator, config files)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Errors while reading a JSON configuration file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DumpfsError {
    /// Create an invalid configuration error with a custom message
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        DumpfsError::InvalidConfiguration(msg.into())
    }

    /// Whether this error was raised before anything was written
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DumpfsError::DestinationNotFound(_)
                | DumpfsError::DestinationNotDirectory(_)
                | DumpfsError::SourceNotFound(_)
                | DumpfsError::SourceNotDirectory(_)
                | DumpfsError::NoSources
                | DumpfsError::InvalidConfiguration(_)
        )
    }

    /// Whether this error aborted a run after the snapshot was started
    pub fn is_fatal_io(&self) -> bool {
        matches!(
            self,
            DumpfsError::SnapshotCreation { .. } | DumpfsError::SourceRootCreation { .. }
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            DumpfsError::DestinationNotFound(path) => {
                format!("{} doesn't exist. Create the backup directory first.", path.display())
            }
            DumpfsError::SourceNotFound(path) => {
                format!("{} doesn't exist. Check the source path.", path.display())
            }
            DumpfsError::SnapshotCreation { path, source } => {
                format!(
                    "Cannot create snapshot {} ({}). Check free space and permissions on the destination.",
                    path.display(),
                    source
                )
            }
            _ => self.to_string(),
        }
    }
}

/// A recoverable failure of one primitive operation on one entry
///
/// Carries the operation that failed, the path it failed on and the OS error.
#[derive(Debug, Error)]
#[error("Can't {operation} {path:?} ({source})")]
pub struct EntryFailure {
    /// Primitive operation that failed
    pub operation: Operation,
    /// Path the operation failed on
    pub path: PathBuf,
    /// Underlying OS error
    #[source]
    pub source: io::Error,
}

impl EntryFailure {
    /// Create a new entry failure
    pub fn new(operation: Operation, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            operation,
            path: path.into(),
            source,
        }
    }
}
