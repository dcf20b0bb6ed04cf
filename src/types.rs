//! Core data types used throughout the dumpfs library
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Configuration**: `DumpfsConfig`, `NamingScheme`, `TimestampPrecision`
//! - **Entries**: `EntryKind`, `EntryAttributes` - what the walker sees on disk
//! - **Results**: `BackupStats`, `BackupOutcome` - what a run produced
//!
//! ## Examples
//!
//! ```rust
//! use dumpfs::types::{DumpfsConfig, NamingScheme, TimestampPrecision};
//!
//! let config = DumpfsConfig {
//!     naming: NamingScheme::Hierarchical,
//!     timestamp_precision: TimestampPrecision::Seconds,
//!     ..Default::default()
//! };
//! assert!(!config.verbose);
//! ```

use crate::error::{EntryFailure, Result};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::fs::{self, FileType, Metadata};
use std::path::{Path, PathBuf};

/// How snapshot directories are named beneath the destination root
///
/// Both schemes sort chronologically under plain lexicographic ordering.
/// Exactly one scheme should be used per destination root: the locator only
/// recognises names of the configured scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingScheme {
    /// `<dest>/YYYY-MM-DD_HH:MM:SS.mmm`
    #[default]
    Flat,
    /// `<dest>/YYYY/MM/DD/HHMMSS.uuuuuu`
    Hierarchical,
}

/// Precision used when copying and comparing timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampPrecision {
    /// Whole seconds; sub-second parts are dropped
    Seconds,
    /// Full precision as reported by the filesystem
    #[default]
    Nanoseconds,
}

impl TimestampPrecision {
    /// Reduce a timestamp to this precision
    pub fn truncate(self, time: FileTime) -> FileTime {
        match self {
            TimestampPrecision::Seconds => FileTime::from_unix_time(time.unix_seconds(), 0),
            TimestampPrecision::Nanoseconds => time,
        }
    }
}

/// Configuration for a dumpfs instance
///
/// Serializable so it can be kept next to the backups as a JSON file. Missing
/// fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpfsConfig {
    /// Snapshot naming scheme
    pub naming: NamingScheme,
    /// Precision for propagated and compared timestamps
    pub timestamp_precision: TimestampPrecision,
    /// Also require equal mtime before hardlinking an unchanged file
    pub compare_mtime: bool,
    /// Log every primitive operation at info level
    pub verbose: bool,
}

impl DumpfsConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Kind of a node reached during traversal (never dereferences symlinks)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory
    Directory,
    /// A regular file
    File,
    /// A symbolic link, dangling or not
    Symlink,
    /// Pipes, sockets, devices and anything else
    Other,
}

impl EntryKind {
    /// Classify from `lstat` metadata
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self::from_file_type(metadata.file_type())
    }

    /// Classify from a file type obtained without following symlinks
    pub fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }

    /// Classify the node at `path` without following a final symlink
    pub fn of(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_metadata(&fs::symlink_metadata(path)?))
    }
}

/// Attributes of one entry as seen by `lstat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryAttributes {
    /// Node kind
    pub kind: EntryKind,
    /// Full `st_mode`, including file type bits
    pub mode: u32,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub mtime: FileTime,
    /// Link target for symlinks
    pub symlink_target: Option<PathBuf>,
}

impl EntryAttributes {
    /// Read the attributes of `path` without following a final symlink
    pub fn read(path: &Path) -> std::io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        let metadata = fs::symlink_metadata(path)?;
        let kind = EntryKind::from_metadata(&metadata);
        let symlink_target = match kind {
            EntryKind::Symlink => Some(fs::read_link(path)?),
            _ => None,
        };

        Ok(Self {
            kind,
            mode: metadata.mode(),
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.len(),
            mtime: FileTime::from_last_modification_time(&metadata),
            symlink_target,
        })
    }
}

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupStats {
    /// Directories created inside the snapshot
    pub directories_created: usize,
    /// Regular files freshly copied
    pub files_copied: usize,
    /// Regular files hardlinked to the previous snapshot
    pub files_linked: usize,
    /// Symbolic links recreated
    pub symlinks_created: usize,
    /// Pipes, sockets and devices left out of the snapshot
    pub special_skipped: usize,
    /// Bytes written by fresh copies
    pub bytes_copied: u64,
    /// Bytes shared with the previous snapshot through hardlinks
    pub bytes_linked: u64,
    /// Entries whose ownership/mode/times were updated
    pub metadata_updates: usize,
    /// Recovered per-entry failures
    pub failures: usize,
}

impl BackupStats {
    /// Total regular files present in the snapshot
    pub fn files_total(&self) -> usize {
        self.files_copied + self.files_linked
    }
}

/// Everything a completed run produced
#[derive(Debug)]
pub struct BackupOutcome {
    /// Absolute path of the new snapshot
    pub snapshot: PathBuf,
    /// Snapshot used for comparison, if any
    pub previous: Option<PathBuf>,
    /// Run counters
    pub stats: BackupStats,
    /// Entries that were skipped or only partially placed
    pub failures: Vec<EntryFailure>,
}

impl BackupOutcome {
    /// Whether every entry was placed without error
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
