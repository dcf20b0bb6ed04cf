//! Primitive filesystem operations
//!
//! Every change dumpfs makes to a snapshot goes through [`FsOps`]. Each
//! primitive performs exactly one system call (or one small, fixed sequence),
//! emits one diagnostic line, updates the run counters and returns a
//! [`Result`] whose error names the failed [`Operation`] and path. Callers
//! decide whether a failure is fatal; the walker treats all of them as
//! recoverable.

use crate::error::EntryFailure;
use crate::types::BackupStats;
use filetime::FileTime;
use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{info, trace};

/// Result of a primitive operation
pub type OpResult<T = ()> = std::result::Result<T, EntryFailure>;

/// Primitive operation names, used in failure reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `mkdir`
    CreateDirectory,
    /// Byte-for-byte copy of a regular file
    CopyFile,
    /// `link`
    HardLink,
    /// `readlink` + `symlink`
    CreateSymlink,
    /// Listing a source directory
    ReadDirectory,
    /// `lstat` of a source entry
    Inspect,
    /// `lchown`
    ChangeOwner,
    /// `chmod`
    ChangeMode,
    /// `utimes`
    SetTimes,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Operation::CreateDirectory => "create directory",
            Operation::CopyFile => "copy file",
            Operation::HardLink => "hard link",
            Operation::CreateSymlink => "create symlink",
            Operation::ReadDirectory => "read directory",
            Operation::Inspect => "inspect",
            Operation::ChangeOwner => "change owner of",
            Operation::ChangeMode => "change mode of",
            Operation::SetTimes => "set times of",
        };
        f.write_str(text)
    }
}

/// Primitive operation layer with diagnostics and counters
#[derive(Debug, Default)]
pub struct FsOps {
    verbose: bool,
    stats: BackupStats,
}

impl FsOps {
    /// Create a new primitive layer
    ///
    /// With `verbose` set, one line per operation is logged at `info`;
    /// otherwise the same lines go to `trace`.
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            stats: BackupStats::default(),
        }
    }

    /// Counters collected so far
    pub fn stats(&self) -> &BackupStats {
        &self.stats
    }

    /// Consume the layer and return its counters
    pub fn into_stats(self) -> BackupStats {
        self.stats
    }

    fn note(&self, line: fmt::Arguments<'_>) {
        if self.verbose {
            info!("{}", line);
        } else {
            trace!("{}", line);
        }
    }

    /// Create every missing directory up to `path`
    ///
    /// Returns the raw OS error: failures here are fatal to the caller.
    pub fn make_dirs(&mut self, path: &Path) -> io::Result<()> {
        self.note(format_args!("makedirs: path={}", path.display()));
        fs::create_dir_all(path)
    }

    /// Create the root directory of a new snapshot
    ///
    /// Unlike [`FsOps::make_dirs`] this fails if `path` already exists, so an
    /// existing snapshot is never reused.
    pub fn make_root(&mut self, path: &Path) -> io::Result<()> {
        self.note(format_args!("mkdir: path={}", path.display()));
        fs::create_dir(path)
    }

    /// Create one directory
    pub fn mkdir(&mut self, path: &Path) -> OpResult {
        self.note(format_args!("mkdir: path={}", path.display()));
        fs::create_dir(path).map_err(|e| EntryFailure::new(Operation::CreateDirectory, path, e))?;
        self.stats.directories_created += 1;
        Ok(())
    }

    /// Copy a regular file's contents from `src` to a new file at `dest`
    pub fn copy(&mut self, src: &Path, dest: &Path) -> OpResult<u64> {
        self.note(format_args!("copy: src={}, dest={}", src.display(), dest.display()));
        let bytes = fs::copy(src, dest).map_err(|e| EntryFailure::new(Operation::CopyFile, src, e))?;
        self.stats.files_copied += 1;
        self.stats.bytes_copied += bytes;
        Ok(bytes)
    }

    /// Hardlink `link` to the existing file `original`
    ///
    /// `size` is only used for the shared-bytes counter.
    pub fn link(&mut self, original: &Path, link: &Path, size: u64) -> OpResult {
        self.note(format_args!(
            "hard link: src={}, dest={}",
            original.display(),
            link.display()
        ));
        fs::hard_link(original, link).map_err(|e| EntryFailure::new(Operation::HardLink, link, e))?;
        self.stats.files_linked += 1;
        self.stats.bytes_linked += size;
        Ok(())
    }

    /// Recreate the symlink at `src` as `dest`, with the identical target
    ///
    /// The target is copied verbatim and never resolved, so dangling links
    /// are preserved as they are.
    pub fn copy_symlink(&mut self, src: &Path, dest: &Path) -> OpResult {
        let target = fs::read_link(src)
            .map_err(|e| EntryFailure::new(Operation::CreateSymlink, src, e))?;
        self.note(format_args!(
            "symlink: src={}, dest={}",
            target.display(),
            dest.display()
        ));
        std::os::unix::fs::symlink(&target, dest)
            .map_err(|e| EntryFailure::new(Operation::CreateSymlink, dest, e))?;
        self.stats.symlinks_created += 1;
        Ok(())
    }

    /// Set owner and group of `path` without following a final symlink
    pub fn lchown(&mut self, path: &Path, uid: u32, gid: u32) -> OpResult {
        self.note(format_args!("lchown: path={}, uid={}, gid={}", path.display(), uid, gid));
        std::os::unix::fs::lchown(path, Some(uid), Some(gid))
            .map_err(|e| EntryFailure::new(Operation::ChangeOwner, path, e))
    }

    /// Copy permission bits and timestamps onto `dest`
    ///
    /// `dest` must not be a symlink: both calls follow links.
    pub fn copystat(
        &mut self,
        src: &Path,
        dest: &Path,
        mode: u32,
        atime: FileTime,
        mtime: FileTime,
    ) -> OpResult {
        self.note(format_args!("copystat: src={}, dest={}", src.display(), dest.display()));
        fs::set_permissions(dest, fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| EntryFailure::new(Operation::ChangeMode, dest, e))?;
        filetime::set_file_times(dest, atime, mtime)
            .map_err(|e| EntryFailure::new(Operation::SetTimes, dest, e))?;
        Ok(())
    }

    /// Record a pipe, socket or device left out of the snapshot
    pub fn skip_special(&mut self, src: &Path) {
        trace!("skip: path={} (not a file, directory or symlink)", src.display());
        self.stats.special_skipped += 1;
    }

    /// Record that one entry's metadata was propagated
    pub(crate) fn count_metadata_update(&mut self) {
        self.stats.metadata_updates += 1;
    }

    /// Record a recovered failure
    pub(crate) fn count_failure(&mut self) {
        self.stats.failures += 1;
    }
}
