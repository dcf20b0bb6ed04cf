//! Per-entry copy strategies
//!
//! The walker hands every non-directory entry to an [`EntryAction`]. Two
//! strategies exist and one is picked per run by [`strategy_for`]:
//!
//! - [`FullCopy`] when there is no previous snapshot: regular files are copied,
//!   symlinks recreated, anything else skipped.
//! - [`IncrementalCopy`] when a previous snapshot exists: regular files that
//!   the [`IdentityComparator`] finds identical to the previous snapshot's file
//!   at the same path are hardlinked to that file; all others are copied.
//!
//! Only regular files are ever hardlinked. Directories and symlinks are
//! always created fresh, so removing one snapshot never affects another.

use crate::compare::IdentityComparator;
use crate::error::EntryFailure;
use crate::ops::{FsOps, OpResult, Operation};
use crate::types::EntryKind;
use std::fs;
use std::path::Path;
use tracing::warn;

/// What happened to one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Fresh copy of a regular file
    Copied,
    /// Hardlink to the previous snapshot's file
    Linked,
    /// Symlink recreated with the same target
    Symlinked,
    /// Special node left out of the snapshot
    Skipped,
}

/// Action applied to each non-directory entry during the structural pass
pub trait EntryAction {
    /// Place `src` at `dest`
    ///
    /// `previous` is the same relative path inside the previous snapshot, or
    /// `None` when there is no previous snapshot.
    fn place(
        &self,
        ops: &mut FsOps,
        previous: Option<&Path>,
        dest: &Path,
        src: &Path,
    ) -> OpResult<Placement>;
}

/// Copies every regular file; used when there is no previous snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct FullCopy;

impl EntryAction for FullCopy {
    fn place(
        &self,
        ops: &mut FsOps,
        _previous: Option<&Path>,
        dest: &Path,
        src: &Path,
    ) -> OpResult<Placement> {
        match inspect(src)? {
            EntryKind::File => {
                ops.copy(src, dest)?;
                Ok(Placement::Copied)
            }
            kind => place_non_file(ops, kind, dest, src),
        }
    }
}

/// Hardlinks unchanged files to the previous snapshot, copies the rest
#[derive(Debug, Clone, Copy, Default)]
pub struct IncrementalCopy {
    comparator: IdentityComparator,
}

impl IncrementalCopy {
    /// Create an incremental strategy using `comparator`
    pub fn new(comparator: IdentityComparator) -> Self {
        Self { comparator }
    }
}

impl EntryAction for IncrementalCopy {
    fn place(
        &self,
        ops: &mut FsOps,
        previous: Option<&Path>,
        dest: &Path,
        src: &Path,
    ) -> OpResult<Placement> {
        let kind = inspect(src)?;
        if kind != EntryKind::File {
            return place_non_file(ops, kind, dest, src);
        }

        let Some(previous) = previous else {
            ops.copy(src, dest)?;
            return Ok(Placement::Copied);
        };

        let same = match self.comparator.is_same(src, previous) {
            Ok(same) => same,
            Err(e) => {
                warn!("Cannot compare {} with {} ({}), copying", src.display(), previous.display(), e);
                false
            }
        };

        if same {
            let size = fs::symlink_metadata(previous).map(|m| m.len()).unwrap_or(0);
            ops.link(previous, dest, size)?;
            Ok(Placement::Linked)
        } else {
            ops.copy(src, dest)?;
            Ok(Placement::Copied)
        }
    }
}

/// Pick the strategy for a run
pub fn strategy_for(previous: Option<&Path>, comparator: IdentityComparator) -> Box<dyn EntryAction> {
    match previous {
        Some(_) => Box::new(IncrementalCopy::new(comparator)),
        None => Box::new(FullCopy),
    }
}

fn inspect(src: &Path) -> OpResult<EntryKind> {
    EntryKind::of(src).map_err(|e| EntryFailure::new(Operation::Inspect, src, e))
}

fn place_non_file(ops: &mut FsOps, kind: EntryKind, dest: &Path, src: &Path) -> OpResult<Placement> {
    match kind {
        EntryKind::Symlink => {
            ops.copy_symlink(src, dest)?;
            Ok(Placement::Symlinked)
        }
        _ => {
            ops.skip_special(src);
            Ok(Placement::Skipped)
        }
    }
}
