//! Two-pass traversal of a source tree into a snapshot
//!
//! ## Structural pass (pre-order)
//!
//! Starting at a source root, every directory child is created as a
//! directory and queued for descent. Every other child, symlinks to
//! directories included, goes to the run's [`EntryAction`] together with its
//! counterpart path in the previous snapshot. Symlinks are never followed.
//!
//! ## Metadata pass (post-order)
//!
//! Once the structural pass for a root is complete, metadata is copied onto
//! the children of every visited directory, deepest directories first. A
//! directory's own metadata is therefore written only after everything inside
//! it has been placed and updated, so its mtime is not disturbed afterwards.
//! Entries and directories that vanished since the structural pass are
//! skipped without a report; listing problems were already reported once.
//!
//! Both passes use an explicit worklist instead of recursion, so tree depth
//! is bounded only by memory. Any failure on one entry is recorded, handed to
//! the [`Reporter`] and the walk continues with the next entry.

use crate::error::EntryFailure;
use crate::ops::{FsOps, Operation};
use crate::propagate::MetadataPropagator;
use crate::report::Reporter;
use crate::strategy::EntryAction;
use crate::types::{BackupStats, EntryKind};
use crate::utils::{self, mirror_path};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Walks source roots into a snapshot, collecting recovered failures
pub struct TreeWalker<'r> {
    ops: FsOps,
    propagator: MetadataPropagator,
    reporter: &'r mut dyn Reporter,
    failures: Vec<EntryFailure>,
    excluded: Vec<PathBuf>,
}

impl<'r> TreeWalker<'r> {
    /// Create a walker
    pub fn new(ops: FsOps, propagator: MetadataPropagator, reporter: &'r mut dyn Reporter) -> Self {
        Self {
            ops,
            propagator,
            reporter,
            failures: Vec::new(),
            excluded: Vec::new(),
        }
    }

    /// Never traverse `path` (used to keep the destination out of its own snapshots)
    pub fn exclude(&mut self, path: PathBuf) {
        self.excluded.push(path);
    }

    /// Primitive layer, for operations the caller performs itself
    pub fn ops_mut(&mut self) -> &mut FsOps {
        &mut self.ops
    }

    /// Mirror `source_root` into `snapshot`
    ///
    /// The mirror of `source_root` itself must already exist. `previous` is
    /// the previous snapshot root, if any.
    pub fn walk(
        &mut self,
        action: &dyn EntryAction,
        source_root: &Path,
        snapshot: &Path,
        previous: Option<&Path>,
    ) {
        debug!("structural pass: {}", source_root.display());
        let directories = self.structural_pass(action, source_root, snapshot, previous);
        debug!(
            "metadata pass: {} ({} directories)",
            source_root.display(),
            directories.len()
        );
        self.metadata_pass(&directories, snapshot);
    }

    /// Copy metadata onto the mirror of `source_root` and each of its
    /// ancestors, up to but excluding the filesystem root
    pub fn propagate_ancestors(&mut self, source_root: &Path, snapshot: &Path) {
        for ancestor in utils::ancestors_below_root(source_root) {
            let dest = mirror_path(snapshot, ancestor);
            if let Err(failure) = self.propagator.propagate_directory(&mut self.ops, ancestor, &dest) {
                self.record(failure);
            }
        }
    }

    /// Finish the run, returning counters and every recovered failure
    pub fn finish(self) -> (BackupStats, Vec<EntryFailure>) {
        (self.ops.into_stats(), self.failures)
    }

    /// Returns the visited source directories in pre-order
    fn structural_pass(
        &mut self,
        action: &dyn EntryAction,
        source_root: &Path,
        snapshot: &Path,
        previous: Option<&Path>,
    ) -> Vec<PathBuf> {
        let mut visited = Vec::new();
        let mut pending = vec![source_root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let listing = match read_children(&dir, &self.excluded) {
                Ok(listing) => listing,
                Err(e) => {
                    self.record(EntryFailure::new(Operation::ReadDirectory, &dir, e));
                    continue;
                }
            };
            for failure in listing.failures {
                self.record(failure);
            }
            let children = listing.children;
            visited.push(dir);

            for (src, kind) in children {
                let dest = mirror_path(snapshot, &src);
                let result = match kind {
                    EntryKind::Directory => self.ops.mkdir(&dest).map(|()| pending.push(src)),
                    _ => {
                        let previous = previous.map(|root| mirror_path(root, &src));
                        action
                            .place(&mut self.ops, previous.as_deref(), &dest, &src)
                            .map(|_| ())
                    }
                };
                if let Err(failure) = result {
                    self.record(failure);
                }
            }
        }

        visited
    }

    fn metadata_pass(&mut self, directories: &[PathBuf], snapshot: &Path) {
        for dir in directories.iter().rev() {
            let children = match read_children(dir, &self.excluded) {
                Ok(listing) => listing.children,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("vanished before the metadata pass: {}", dir.display());
                    continue;
                }
                Err(e) => {
                    self.record(EntryFailure::new(Operation::ReadDirectory, dir, e));
                    continue;
                }
            };
            for (src, kind) in children {
                if kind == EntryKind::Other {
                    continue;
                }
                let dest = mirror_path(snapshot, &src);
                if let Err(failure) = self.propagator.propagate(&mut self.ops, &src, &dest) {
                    self.record(failure);
                }
            }
        }
    }

    fn record(&mut self, failure: EntryFailure) {
        self.ops.count_failure();
        self.reporter.report(&failure);
        self.failures.push(failure);
    }
}

/// Children of one directory, sorted by name, minus excluded paths
struct Listing {
    children: Vec<(PathBuf, EntryKind)>,
    /// Entries that could not be read or inspected
    failures: Vec<EntryFailure>,
}

/// Fails only when `dir` itself cannot be opened
fn read_children(dir: &Path, excluded: &[PathBuf]) -> io::Result<Listing> {
    let mut children = Vec::new();
    let mut failures = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                failures.push(EntryFailure::new(Operation::ReadDirectory, dir, e));
                continue;
            }
        };
        let path = entry.path();
        if excluded.iter().any(|excluded| excluded == &path) {
            debug!("skipping {}: inside the destination", path.display());
            continue;
        }
        match entry.file_type() {
            Ok(file_type) => children.push((path, EntryKind::from_file_type(file_type))),
            Err(e) => failures.push(EntryFailure::new(Operation::Inspect, path, e)),
        }
    }

    children.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(Listing { children, failures })
}
