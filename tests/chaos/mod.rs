//! Chaos testing for dumpfs
//!
//! Damaged previous snapshots, entries that vanish mid-run, unreadable
//! sources and unwritable destinations. A run must either fail up front with
//! a typed error or produce a snapshot and report what it skipped.

use ::dumpfs::ops::{FsOps, OpResult, Operation};
use ::dumpfs::propagate::MetadataPropagator;
use ::dumpfs::strategy::{EntryAction, FullCopy, Placement};
use ::dumpfs::utils::mirror_path;
use ::dumpfs::walker::TreeWalker;
use ::dumpfs::*;
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::warn;

/// Source and destination for one chaos scenario
pub struct DumpfsChaosTest {
    pub src_dir: TempDir,
    pub dest_dir: TempDir,
    pub dumpfs: Dumpfs,
}

impl DumpfsChaosTest {
    pub fn new() -> Self {
        let test = Self {
            src_dir: TempDir::new().unwrap(),
            dest_dir: TempDir::new().unwrap(),
            dumpfs: DumpfsBuilder::new().reporter(CollectingReporter::new()).build(),
        };
        fs::create_dir_all(test.src().join("docs/drafts")).unwrap();
        fs::write(test.src().join("docs/report.txt"), "quarterly numbers").unwrap();
        fs::write(test.src().join("docs/drafts/idea.txt"), "half an idea").unwrap();
        fs::write(test.src().join("notes.txt"), "remember the milk").unwrap();
        test
    }

    pub fn src(&self) -> &Path {
        self.src_dir.path()
    }

    pub fn dest(&self) -> &Path {
        self.dest_dir.path()
    }

    pub fn backup(&mut self) -> ::dumpfs::Result<BackupOutcome> {
        let dest = self.dest().to_path_buf();
        let src = self.src().to_path_buf();
        self.dumpfs.backup_with_outcome(&dest, &[&src])
    }

    /// Failures reported for entries inside the source or its mirror
    pub fn own_failures<'a>(&self, outcome: &'a BackupOutcome) -> Vec<&'a EntryFailure> {
        let mirror = mirror_path(&outcome.snapshot, self.src());
        outcome
            .failures
            .iter()
            .filter(|f| f.path.starts_with(&mirror) || f.path.starts_with(self.src()))
            .collect()
    }
}

impl Default for DumpfsChaosTest {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies like [`FullCopy`], then deletes a victim once it has been placed
///
/// A file victim goes away right after its own copy. A directory victim goes
/// away, with everything in it, right after its first child is copied.
pub struct VanishingSource {
    pub victims: Vec<PathBuf>,
}

impl EntryAction for VanishingSource {
    fn place(&self, ops: &mut FsOps, previous: Option<&Path>, dest: &Path, src: &Path) -> OpResult<Placement> {
        let placement = FullCopy.place(ops, previous, dest, src)?;
        for victim in &self.victims {
            if victim == src {
                warn!("chaos: removing {}", src.display());
                fs::remove_file(src).ok();
            } else if src.parent() == Some(victim.as_path()) && victim.is_dir() {
                warn!("chaos: removing directory {}", victim.display());
                fs::remove_dir_all(victim).ok();
            }
        }
        Ok(placement)
    }
}

fn is_root() -> bool {
    rustix::process::geteuid().is_root()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_tampered_previous_snapshot_is_not_linked() {
        let mut chaos = DumpfsChaosTest::new();
        let first = chaos.backup().unwrap();

        // Same size and mode, different bytes
        let report = chaos.src().join("docs/report.txt");
        let stale = mirror_path(&first.snapshot, &report);
        fs::write(&stale, "QUARTERLY NUMBERS").unwrap();
        let src_meta = fs::metadata(&report).unwrap();
        fs::set_permissions(&stale, fs::Permissions::from_mode(src_meta.mode())).unwrap();

        let second = chaos.backup().unwrap();
        let fresh = mirror_path(&second.snapshot, &report);
        assert_eq!(fs::read_to_string(&fresh).unwrap(), "quarterly numbers");
        assert_ne!(fs::metadata(&fresh).unwrap().ino(), fs::metadata(&stale).unwrap().ino());
        assert_eq!(second.stats.files_copied, 1);
        assert_eq!(second.stats.files_linked, 2);
    }

    #[test]
    fn test_pruned_previous_snapshot_falls_back_to_copy() {
        let mut chaos = DumpfsChaosTest::new();
        let first = chaos.backup().unwrap();
        fs::remove_dir_all(mirror_path(&first.snapshot, &chaos.src().join("docs"))).unwrap();

        let second = chaos.backup().unwrap();
        assert!(chaos.own_failures(&second).is_empty(), "{:?}", second.failures);
        assert_eq!(second.stats.files_copied, 2);
        assert_eq!(second.stats.files_linked, 1);
        let idea = mirror_path(&second.snapshot, &chaos.src().join("docs/drafts/idea.txt"));
        assert_eq!(fs::read_to_string(idea).unwrap(), "half an idea");
    }

    #[test]
    fn test_entries_vanishing_before_metadata_pass() {
        let chaos = DumpfsChaosTest::new();
        let snapshot_dir = TempDir::new().unwrap();
        let src = chaos.src();
        let victim = src.join("notes.txt");

        let mut reporter = CollectingReporter::new();
        let mut walker = TreeWalker::new(FsOps::new(false), MetadataPropagator::default(), &mut reporter);
        fs::create_dir_all(mirror_path(snapshot_dir.path(), src)).unwrap();
        let action = VanishingSource {
            victims: vec![victim.clone()],
        };
        walker.walk(&action, src, snapshot_dir.path(), None);
        let (stats, failures) = walker.finish();

        assert!(failures.is_empty(), "{:?}", failures);
        assert!(!victim.exists());
        assert!(mirror_path(snapshot_dir.path(), &victim).exists());
        assert_eq!(stats.files_copied, 3);
        // docs, drafts, report.txt, idea.txt; notes.txt was gone
        assert_eq!(stats.metadata_updates, 4);
    }

    #[test]
    fn test_directory_vanishing_before_metadata_pass() {
        let chaos = DumpfsChaosTest::new();
        let snapshot_dir = TempDir::new().unwrap();
        let src = chaos.src();
        let drafts = src.join("docs/drafts");

        let mut reporter = CollectingReporter::new();
        let mut walker = TreeWalker::new(FsOps::new(false), MetadataPropagator::default(), &mut reporter);
        fs::create_dir_all(mirror_path(snapshot_dir.path(), src)).unwrap();
        let action = VanishingSource {
            victims: vec![drafts.clone()],
        };
        walker.walk(&action, src, snapshot_dir.path(), None);
        let (stats, failures) = walker.finish();

        assert!(failures.is_empty(), "{:?}", failures);
        assert_eq!(stats.failures, 0);
        assert!(!drafts.exists());
        assert!(mirror_path(snapshot_dir.path(), &drafts.join("idea.txt")).exists());
        // docs, report.txt, notes.txt; drafts and idea.txt were gone
        assert_eq!(stats.metadata_updates, 3);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        if is_root() {
            return;
        }
        let mut chaos = DumpfsChaosTest::new();
        let locked = chaos.src().join("docs/report.txt");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let outcome = chaos.backup();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        let outcome = outcome.unwrap();

        let own = chaos.own_failures(&outcome);
        assert_eq!(own.len(), 1, "{:?}", own);
        assert_eq!(own[0].operation, Operation::CopyFile);
        assert_eq!(own[0].path, locked);
        assert!(!mirror_path(&outcome.snapshot, &locked).exists());
        assert!(mirror_path(&outcome.snapshot, &chaos.src().join("notes.txt")).exists());
    }

    #[test]
    fn test_unreadable_directory_is_skipped() {
        if is_root() {
            return;
        }
        let mut chaos = DumpfsChaosTest::new();
        let drafts = chaos.src().join("docs/drafts");
        fs::set_permissions(&drafts, fs::Permissions::from_mode(0o000)).unwrap();

        let outcome = chaos.backup();
        fs::set_permissions(&drafts, fs::Permissions::from_mode(0o755)).unwrap();
        let outcome = outcome.unwrap();
        fs::set_permissions(mirror_path(&outcome.snapshot, &drafts), fs::Permissions::from_mode(0o755)).unwrap();

        assert!(chaos
            .own_failures(&outcome)
            .iter()
            .any(|f| f.operation == Operation::ReadDirectory && f.path == drafts));
        assert!(mirror_path(&outcome.snapshot, &chaos.src().join("docs/report.txt")).exists());
    }

    #[test]
    fn test_read_only_destination_is_fatal() {
        if is_root() {
            return;
        }
        let mut chaos = DumpfsChaosTest::new();
        fs::set_permissions(chaos.dest(), fs::Permissions::from_mode(0o555)).unwrap();

        let result = chaos.backup();
        fs::set_permissions(chaos.dest(), fs::Permissions::from_mode(0o755)).unwrap();

        let err = result.unwrap_err();
        assert!(err.is_fatal_io(), "{:?}", err);
        assert!(matches!(err, DumpfsError::SnapshotCreation { .. }));
    }

    #[test]
    fn test_snapshot_from_the_future_keeps_order() {
        let mut chaos = DumpfsChaosTest::new();
        let future = chaos.dest().join("2999-12-31_23:59:59.998");
        fs::create_dir(&future).unwrap();

        let first = chaos.backup().unwrap();
        let second = chaos.backup().unwrap();

        assert_eq!(first.previous.as_deref(), Some(future.as_path()));
        assert_eq!(first.snapshot, chaos.dest().join("2999-12-31_23:59:59.999"));
        assert_eq!(second.snapshot, chaos.dest().join("3000-01-01_00:00:00.000"));
        assert_eq!(second.stats.files_linked, 3);
    }

    #[test]
    fn test_foreign_entries_in_destination_are_ignored() {
        let mut chaos = DumpfsChaosTest::new();
        fs::create_dir(chaos.dest().join("lost+found")).unwrap();
        fs::write(chaos.dest().join("README"), "backups live here").unwrap();
        fs::create_dir(chaos.dest().join("2024-13-45_99:99:99.999")).unwrap();

        let outcome = chaos.backup().unwrap();
        assert!(outcome.previous.is_none());
        assert_eq!(outcome.stats.files_copied, 3);
    }
}
