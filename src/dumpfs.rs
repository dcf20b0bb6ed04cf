//! Backup orchestration
//!
//! This module provides [`Dumpfs`], the entry point for taking snapshots, and
//! [`DumpfsBuilder`] for configuring it.
//!
//! ## Overview
//!
//! One call to [`Dumpfs::backup`] performs a complete run:
//!
//! 1. Pre-flight checks: the destination root and every source root must be
//!    existing directories. Nothing is written if any check fails.
//! 2. The most recent snapshot under the destination is located.
//! 3. A new snapshot directory is named after the current local time and
//!    created.
//! 4. Each source root is mirrored at its absolute path inside the snapshot,
//!    hardlinking files that are unchanged since the previous snapshot.
//! 5. Metadata is copied onto each source root's ancestors.
//!
//! Per-entry failures during steps 4 and 5 are reported and skipped; the run
//! still returns the snapshot path.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use dumpfs::{DumpfsBuilder, NamingScheme};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dumpfs = DumpfsBuilder::new()
//!     .naming(NamingScheme::Hierarchical)
//!     .verbose(true)
//!     .build();
//!
//! let snapshot = dumpfs.backup(Path::new("/backup"), &["/home/me/projects"])?;
//! println!("Snapshot at {}", snapshot.display());
//! # Ok(())
//! # }
//! ```

use crate::compare::IdentityComparator;
use crate::error::{DumpfsError, Result};
use crate::ops::FsOps;
use crate::propagate::MetadataPropagator;
use crate::report::{Reporter, TracingReporter};
use crate::snapshot;
use crate::strategy;
use crate::types::{BackupOutcome, DumpfsConfig, NamingScheme, TimestampPrecision};
use crate::utils::{self, mirror_path};
use crate::walker::TreeWalker;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Snapshot engine
///
/// Holds the run configuration and the [`Reporter`] that receives recovered
/// failures. One instance can perform any number of runs, one at a time.
pub struct Dumpfs {
    config: DumpfsConfig,
    reporter: Box<dyn Reporter>,
}

impl std::fmt::Debug for Dumpfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dumpfs")
            .field("config", &self.config)
            .field("reporter", &"<reporter>")
            .finish()
    }
}

impl Dumpfs {
    /// Create an engine that logs failures through `tracing`
    pub fn new(config: DumpfsConfig) -> Self {
        Self {
            config,
            reporter: Box::new(TracingReporter),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &DumpfsConfig {
        &self.config
    }

    /// Take a snapshot of `sources` under `dest`
    ///
    /// Returns the absolute path of the new snapshot. See
    /// [`Dumpfs::backup_with_outcome`] for counters and the list of entries
    /// that failed.
    ///
    /// # Errors
    ///
    /// - A configuration error, with nothing written, if `dest` or any source
    ///   is missing or not a directory, or if no source is given.
    /// - [`DumpfsError::SnapshotCreation`] or
    ///   [`DumpfsError::SourceRootCreation`] if the snapshot could not be laid
    ///   out.
    pub fn backup<P: AsRef<Path>>(&mut self, dest: &Path, sources: &[P]) -> Result<PathBuf> {
        self.backup_with_outcome(dest, sources).map(|outcome| outcome.snapshot)
    }

    /// Take a snapshot and return everything the run produced
    #[instrument(skip(self, dest, sources), fields(dest = %dest.display()))]
    pub fn backup_with_outcome<P: AsRef<Path>>(
        &mut self,
        dest: &Path,
        sources: &[P],
    ) -> Result<BackupOutcome> {
        let started = Instant::now();
        let (dest, sources) = preflight(dest, sources)?;

        let previous = snapshot::find_previous(&dest, self.config.naming)?;
        match &previous {
            Some(previous) => info!("Previous snapshot: {}", previous.display()),
            None => info!("No previous snapshot, copying everything"),
        }

        let now = Local::now().naive_local();
        let snapshot = snapshot::next_snapshot_path(&dest, self.config.naming, now, previous.as_deref());

        let mut ops = FsOps::new(self.config.verbose);
        create_snapshot_root(&mut ops, &snapshot)?;

        let comparator = IdentityComparator::new(self.config.timestamp_precision, self.config.compare_mtime);
        let action = strategy::strategy_for(previous.as_deref(), comparator);
        let propagator = MetadataPropagator::new(self.config.timestamp_precision);

        let mut walker = TreeWalker::new(ops, propagator, &mut *self.reporter);
        walker.exclude(dest.clone());

        for source in &sources {
            let root = mirror_path(&snapshot, source);
            walker
                .ops_mut()
                .make_dirs(&root)
                .map_err(|e| DumpfsError::SourceRootCreation { path: root.clone(), source: e })?;
            info!("Backing up {}", source.display());
            walker.walk(action.as_ref(), source, &snapshot, previous.as_deref());
        }

        // After every walk, so no later mkdir disturbs an ancestor's mtime.
        for source in &sources {
            walker.propagate_ancestors(source, &snapshot);
        }

        let (stats, failures) = walker.finish();
        debug!(
            "{} copied, {} linked, {} failures in {:?}",
            stats.files_copied,
            stats.files_linked,
            failures.len(),
            started.elapsed()
        );
        info!("done. The backup directory is {}", snapshot.display());

        Ok(BackupOutcome {
            snapshot,
            previous,
            stats,
            failures,
        })
    }

    /// Most recent snapshot under `dest`
    pub fn previous_snapshot(&self, dest: &Path) -> Result<Option<PathBuf>> {
        check_destination(dest)?;
        snapshot::find_previous(dest, self.config.naming)
    }

    /// All snapshots under `dest`, oldest first
    pub fn list_snapshots(&self, dest: &Path) -> Result<Vec<PathBuf>> {
        check_destination(dest)?;
        snapshot::list_snapshots(dest, self.config.naming)
    }
}

fn check_destination(dest: &Path) -> Result<()> {
    match fs::metadata(dest) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(DumpfsError::DestinationNotDirectory(dest.to_path_buf())),
        Err(_) => Err(DumpfsError::DestinationNotFound(dest.to_path_buf())),
    }
}

/// Validate and absolutize the run's paths without touching the disk
fn preflight<P: AsRef<Path>>(dest: &Path, sources: &[P]) -> Result<(PathBuf, Vec<PathBuf>)> {
    check_destination(dest)?;
    if sources.is_empty() {
        return Err(DumpfsError::NoSources);
    }
    let dest = utils::absolutize(dest)?;

    let mut roots = Vec::with_capacity(sources.len());
    for source in sources {
        let source = source.as_ref();
        match fs::metadata(source) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(DumpfsError::SourceNotDirectory(source.to_path_buf())),
            Err(_) => return Err(DumpfsError::SourceNotFound(source.to_path_buf())),
        }
        let source = utils::absolutize(source)?;
        if source == dest {
            return Err(DumpfsError::invalid_configuration(format!(
                "{} is both the destination and a source",
                dest.display()
            )));
        }
        roots.push(source);
    }

    Ok((dest, roots))
}

fn create_snapshot_root(ops: &mut FsOps, snapshot: &Path) -> Result<()> {
    let creation_error = |e| DumpfsError::SnapshotCreation {
        path: snapshot.to_path_buf(),
        source: e,
    };
    if let Some(parent) = snapshot.parent() {
        ops.make_dirs(parent).map_err(creation_error)?;
    }
    ops.make_root(snapshot).map_err(creation_error)
}

/// Builder for configuring a [`Dumpfs`] instance
///
/// # Examples
///
/// ```rust
/// use dumpfs::{DumpfsBuilder, EntryFailure, NamingScheme, TimestampPrecision};
///
/// let dumpfs = DumpfsBuilder::new()
///     .naming(NamingScheme::Flat)
///     .timestamp_precision(TimestampPrecision::Seconds)
///     .compare_mtime(true)
///     .reporter(|failure: &EntryFailure| eprintln!("{}", failure))
///     .build();
/// assert!(dumpfs.config().compare_mtime);
/// ```
///
/// # Default Values
///
/// - `naming`: `NamingScheme::Flat`
/// - `timestamp_precision`: `TimestampPrecision::Nanoseconds`
/// - `compare_mtime`: false
/// - `verbose`: false
/// - `reporter`: [`TracingReporter`]
pub struct DumpfsBuilder {
    config: DumpfsConfig,
    reporter: Box<dyn Reporter>,
}

impl std::fmt::Debug for DumpfsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpfsBuilder").field("config", &self.config).finish()
    }
}

impl DumpfsBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: DumpfsConfig::default(),
            reporter: Box::new(TracingReporter),
        }
    }

    /// Replace the whole configuration, e.g. one loaded with
    /// [`DumpfsConfig::from_file`]
    pub fn config(mut self, config: DumpfsConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the snapshot naming scheme
    ///
    /// Use one scheme per destination: snapshots named with the other scheme
    /// are not found as previous snapshots.
    pub fn naming(mut self, naming: NamingScheme) -> Self {
        self.config.naming = naming;
        self
    }

    /// Set the precision of copied and compared timestamps
    pub fn timestamp_precision(mut self, precision: TimestampPrecision) -> Self {
        self.config.timestamp_precision = precision;
        self
    }

    /// Also require equal modification times before hardlinking
    pub fn compare_mtime(mut self, enabled: bool) -> Self {
        self.config.compare_mtime = enabled;
        self
    }

    /// Log every primitive operation at info level
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.config.verbose = enabled;
        self
    }

    /// Receive recovered failures with `reporter` instead of logging them
    pub fn reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Build the engine
    pub fn build(self) -> Dumpfs {
        Dumpfs {
            config: self.config,
            reporter: self.reporter,
        }
    }
}

impl Default for DumpfsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
