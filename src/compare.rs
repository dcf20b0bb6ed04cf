//! Identity comparison between a source file and its previous-snapshot copy
//!
//! A file is hardlinked into the new snapshot only when [`IdentityComparator`]
//! says the source and the previous snapshot's file at the same relative path
//! are identical. Checks run cheapest first: mode, uid, gid and size (and
//! optionally mtime) from one `lstat` each, then a byte-for-byte comparison
//! of the contents, which only happens when all metadata already matches.

use crate::types::{EntryAttributes, EntryKind, TimestampPrecision};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::trace;

const COMPARE_BUFFER_SIZE: usize = 64 * 1024;

/// Decides whether two files are identical in metadata and content
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityComparator {
    precision: TimestampPrecision,
    compare_mtime: bool,
}

impl IdentityComparator {
    /// Create a comparator
    ///
    /// With `compare_mtime` set, modification times must also be equal at
    /// `precision`.
    pub fn new(precision: TimestampPrecision, compare_mtime: bool) -> Self {
        Self {
            precision,
            compare_mtime,
        }
    }

    /// Whether `candidate` is identical to `previous`
    ///
    /// Returns `false` when either path is a directory (this comparator is
    /// file-only) or when `previous` does not exist. Errors only come from
    /// reading `candidate` or from reading contents after the metadata
    /// matched.
    pub fn is_same(&self, candidate: &Path, previous: &Path) -> io::Result<bool> {
        let candidate_attrs = EntryAttributes::read(candidate)?;
        if candidate_attrs.kind == EntryKind::Directory {
            return Ok(false);
        }

        let previous_attrs = match EntryAttributes::read(previous) {
            Ok(attrs) => attrs,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        if previous_attrs.kind == EntryKind::Directory {
            return Ok(false);
        }

        if !self.metadata_matches(&candidate_attrs, &previous_attrs) {
            trace!("metadata differs: {}", candidate.display());
            return Ok(false);
        }

        if candidate_attrs.kind != EntryKind::File {
            return Ok(candidate_attrs.symlink_target == previous_attrs.symlink_target);
        }

        same_contents(candidate, previous)
    }

    fn metadata_matches(&self, a: &EntryAttributes, b: &EntryAttributes) -> bool {
        if a.mode != b.mode || a.uid != b.uid || a.gid != b.gid || a.size != b.size {
            return false;
        }
        !self.compare_mtime || self.precision.truncate(a.mtime) == self.precision.truncate(b.mtime)
    }
}

/// Compare two files byte for byte
///
/// Both buffers live only for the duration of the call.
fn same_contents(a: &Path, b: &Path) -> io::Result<bool> {
    let mut file_a = File::open(a)?;
    let mut file_b = File::open(b)?;
    let mut buf_a = vec![0u8; COMPARE_BUFFER_SIZE];
    let mut buf_b = vec![0u8; COMPARE_BUFFER_SIZE];

    loop {
        let read_a = fill(&mut file_a, &mut buf_a)?;
        let read_b = fill(&mut file_b, &mut buf_b)?;
        if read_a != read_b || buf_a[..read_a] != buf_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
    }
}

/// Read until `buf` is full or the reader is exhausted
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
