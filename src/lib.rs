//! # dumpfs - Incremental hardlink snapshots
//!
//! Periodic, browsable backups of directory trees that only cost space for
//! what changed.
//!
//! ## Overview
//!
//! Every run creates a new timestamped snapshot directory under a destination
//! root. The snapshot is a complete, ordinary copy of each source directory,
//! mirrored at its absolute path: backing up `/home/me` into `/backup`
//! produces `/backup/2024-05-01_12:00:00.000/home/me`. Regular files that did
//! not change since the previous snapshot are hardlinked to it instead of
//! being copied again, so:
//! - every snapshot can be browsed, restored from or deleted on its own
//! - unchanged files are stored once, however many snapshots reference them
//! - ownership, permissions and timestamps are mirrored, including on the
//!   directories leading up to each source root
//!
//! ## Architecture
//!
//! - **Locator and namer** ([`snapshot`]): find the most recent snapshot and
//!   derive the next, always-increasing snapshot name
//! - **Walker** ([`walker`]): two passes per source root over an explicit
//!   worklist, placing entries first and copying metadata afterwards
//! - **Strategies** ([`strategy`]): full copy on the first run, hardlink or
//!   copy afterwards
//! - **Comparator** ([`compare`]): metadata then content equality
//! - **Propagator** ([`propagate`]): ownership, mode and timestamps
//! - **Reporting** ([`report`]): per-entry failures are reported and skipped
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dumpfs::{Dumpfs, DumpfsConfig};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dumpfs = Dumpfs::new(DumpfsConfig::default());
//!
//! // First run copies everything
//! let first = dumpfs.backup(Path::new("/backup"), &["/home/me"])?;
//!
//! // Later runs hardlink whatever is unchanged
//! let outcome = dumpfs.backup_with_outcome(Path::new("/backup"), &["/home/me"])?;
//! println!(
//!     "{}: {} copied, {} linked (previous: {})",
//!     outcome.snapshot.display(),
//!     outcome.stats.files_copied,
//!     outcome.stats.files_linked,
//!     first.display()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Handling
//!
//! Problems with the destination or the sources are detected before anything
//! is written and returned as [`DumpfsError`]. Once a snapshot exists, a
//! failure on one entry (an unreadable file, a failed `chown`) is handed to
//! the configured [`Reporter`] and the run carries on:
//!
//! ```rust,no_run
//! use dumpfs::{CollectingReporter, DumpfsBuilder};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dumpfs = DumpfsBuilder::new().reporter(CollectingReporter::new()).build();
//! let outcome = dumpfs.backup_with_outcome(Path::new("/backup"), &["/etc"])?;
//! for failure in &outcome.failures {
//!     eprintln!("{}", failure);
//! }
//! # Ok(())
//! # }
//! ```

pub mod compare;
pub mod dumpfs;
pub mod error;
pub mod ops;
pub mod propagate;
pub mod report;
pub mod snapshot;
pub mod strategy;
pub mod types;
pub mod utils;
pub mod walker;

pub use dumpfs::{Dumpfs, DumpfsBuilder};
pub use error::{DumpfsError, EntryFailure, Result};
pub use report::{CollectingReporter, Reporter, TracingReporter};
pub use types::*;
