//! Ownership, mode and timestamp propagation
//!
//! Ownership is copied onto every entry without following symlinks. Mode,
//! access time and modification time are copied onto everything except
//! symlinks. Timestamps are reduced to the configured
//! [`TimestampPrecision`] first.

use crate::error::EntryFailure;
use crate::ops::{FsOps, OpResult, Operation};
use crate::types::TimestampPrecision;
use crate::utils;
use filetime::FileTime;
use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// Copies source metadata onto destination entries
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataPropagator {
    precision: TimestampPrecision,
}

impl MetadataPropagator {
    /// Create a propagator that copies timestamps at `precision`
    pub fn new(precision: TimestampPrecision) -> Self {
        Self { precision }
    }

    /// Copy metadata of `src` onto `dest`, never following a final symlink
    ///
    /// Returns `Ok(false)` without touching anything when `dest` is absent
    /// or `src` has disappeared since the structural pass.
    pub fn propagate(&self, ops: &mut FsOps, src: &Path, dest: &Path) -> OpResult<bool> {
        if !utils::lexists(dest) {
            return Ok(false);
        }
        let metadata = match fs::symlink_metadata(src) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(EntryFailure::new(Operation::Inspect, src, e)),
        };
        self.apply(ops, &metadata, src, dest)?;
        Ok(true)
    }

    /// Copy metadata of the directory `src` onto `dest`, following symlinks
    ///
    /// Used for the source roots and their ancestors, whose mirrors inside
    /// the snapshot are always real directories even when the source path
    /// goes through a symlink.
    pub fn propagate_directory(&self, ops: &mut FsOps, src: &Path, dest: &Path) -> OpResult {
        let metadata = fs::metadata(src).map_err(|e| EntryFailure::new(Operation::Inspect, src, e))?;
        self.apply(ops, &metadata, src, dest)
    }

    /// Mode and times are still applied when the ownership change fails; the
    /// first failure is returned.
    fn apply(&self, ops: &mut FsOps, metadata: &Metadata, src: &Path, dest: &Path) -> OpResult {
        let owner = ops.lchown(dest, metadata.uid(), metadata.gid());
        let stat = if metadata.file_type().is_symlink() {
            Ok(())
        } else {
            let atime = self.precision.truncate(FileTime::from_last_access_time(metadata));
            let mtime = self.precision.truncate(FileTime::from_last_modification_time(metadata));
            ops.copystat(src, dest, metadata.mode(), atime, mtime)
        };
        owner.and(stat)?;
        ops.count_metadata_update();
        Ok(())
    }
}
