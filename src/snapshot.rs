//! Snapshot discovery and naming
//!
//! Snapshots live directly under the destination root and are named after the
//! wall-clock time of their run, in one of two [`NamingScheme`]s:
//!
//! - Flat: `YYYY-MM-DD_HH:MM:SS.mmm`
//! - Hierarchical: `YYYY/MM/DD/HHMMSS.uuuuuu`
//!
//! Every field is zero-padded to a fixed width, so lexicographic order of the
//! names is chronological order and the most recent snapshot is simply the
//! greatest name. Only names that parse as a valid timestamp of the configured
//! scheme are considered; anything else under the destination is ignored.

use crate::error::Result;
use crate::types::NamingScheme;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Encodes run timestamps as relative snapshot paths and back
pub trait SnapshotNamer: Send + Sync {
    /// Relative path of the snapshot taken at `time`
    fn format(&self, time: NaiveDateTime) -> PathBuf;

    /// Timestamp encoded by `relative`, or `None` if it is not a name of
    /// this scheme
    fn parse(&self, relative: &Path) -> Option<NaiveDateTime>;

    /// Smallest time step two names can differ by
    fn resolution(&self) -> TimeDelta;

    /// Number of path components in a name
    fn depth(&self) -> usize;
}

/// `YYYY-MM-DD_HH:MM:SS.mmm`, millisecond resolution
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatNamer;

impl SnapshotNamer for FlatNamer {
    fn format(&self, time: NaiveDateTime) -> PathBuf {
        PathBuf::from(time.format("%Y-%m-%d_%H:%M:%S%.3f").to_string())
    }

    fn parse(&self, relative: &Path) -> Option<NaiveDateTime> {
        let name = relative.to_str()?;
        let bytes = name.as_bytes();
        if bytes.len() != 23 || !name.is_ascii() {
            return None;
        }
        let separators = [(4, b'-'), (7, b'-'), (10, b'_'), (13, b':'), (16, b':'), (19, b'.')];
        if separators.iter().any(|&(at, sep)| bytes[at] != sep) {
            return None;
        }

        let date = NaiveDate::from_ymd_opt(
            digits(&name[0..4])? as i32,
            digits(&name[5..7])?,
            digits(&name[8..10])?,
        )?;
        let time = NaiveTime::from_hms_milli_opt(
            digits(&name[11..13])?,
            digits(&name[14..16])?,
            digits(&name[17..19])?,
            digits(&name[20..23])?,
        )?;
        Some(date.and_time(time))
    }

    fn resolution(&self) -> TimeDelta {
        TimeDelta::milliseconds(1)
    }

    fn depth(&self) -> usize {
        1
    }
}

/// `YYYY/MM/DD/HHMMSS.uuuuuu`, microsecond resolution
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchicalNamer;

impl SnapshotNamer for HierarchicalNamer {
    fn format(&self, time: NaiveDateTime) -> PathBuf {
        PathBuf::from(time.format("%Y/%m/%d/%H%M%S%.6f").to_string())
    }

    fn parse(&self, relative: &Path) -> Option<NaiveDateTime> {
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        let [year, month, day, clock] = parts.as_slice() else {
            return None;
        };
        if year.len() != 4 || month.len() != 2 || day.len() != 2 {
            return None;
        }
        if clock.len() != 13 || !clock.is_ascii() || clock.as_bytes()[6] != b'.' {
            return None;
        }

        let date = NaiveDate::from_ymd_opt(digits(year)? as i32, digits(month)?, digits(day)?)?;
        let time = NaiveTime::from_hms_micro_opt(
            digits(&clock[0..2])?,
            digits(&clock[2..4])?,
            digits(&clock[4..6])?,
            digits(&clock[7..13])?,
        )?;
        Some(date.and_time(time))
    }

    fn resolution(&self) -> TimeDelta {
        TimeDelta::microseconds(1)
    }

    fn depth(&self) -> usize {
        4
    }
}

/// Namer implementing `scheme`
pub fn namer_for(scheme: NamingScheme) -> &'static dyn SnapshotNamer {
    match scheme {
        NamingScheme::Flat => &FlatNamer,
        NamingScheme::Hierarchical => &HierarchicalNamer,
    }
}

/// All snapshots under `dest`, oldest first
///
/// Entries that do not match `scheme` are ignored, as are subtrees that
/// cannot be read (with a warning).
pub fn list_snapshots(dest: &Path, scheme: NamingScheme) -> Result<Vec<PathBuf>> {
    let namer = namer_for(scheme);
    let mut found = Vec::new();

    if namer.depth() == 1 {
        for entry in fs::read_dir(dest)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() && namer.parse(Path::new(&entry.file_name())).is_some() {
                found.push(entry.path());
            }
        }
    } else {
        let walker = WalkDir::new(dest)
            .min_depth(namer.depth())
            .max_depth(namer.depth())
            .follow_links(false);
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable part of {}: {}", dest.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dest) else {
                continue;
            };
            if namer.parse(relative).is_some() {
                found.push(entry.into_path());
            }
        }
    }

    // Fixed-width names: byte order is time order.
    found.sort();
    debug!("found {} snapshots under {}", found.len(), dest.display());
    Ok(found)
}

/// The most recent snapshot under `dest`, if any
pub fn find_previous(dest: &Path, scheme: NamingScheme) -> Result<Option<PathBuf>> {
    Ok(list_snapshots(dest, scheme)?.pop())
}

/// Path for a new snapshot taken at `now`
///
/// `now` is truncated to the scheme's resolution. If the result would not
/// sort after `previous` (two runs inside one resolution step, or a clock
/// that went backwards) the previous snapshot's time plus one step is used
/// instead, so names always increase.
pub fn next_snapshot_path(
    dest: &Path,
    scheme: NamingScheme,
    now: NaiveDateTime,
    previous: Option<&Path>,
) -> PathBuf {
    let namer = namer_for(scheme);
    let mut time = truncate(now, namer.resolution());

    let previous_time = previous
        .and_then(|p| p.strip_prefix(dest).ok())
        .and_then(|relative| namer.parse(relative));
    if let Some(previous_time) = previous_time {
        if time <= previous_time {
            debug!("clock at or before {}, advancing", previous_time);
            time = previous_time + namer.resolution();
        }
    }

    dest.join(namer.format(time))
}

fn truncate(time: NaiveDateTime, resolution: TimeDelta) -> NaiveDateTime {
    let step = resolution.num_nanoseconds().unwrap_or(1).max(1) as u32;
    let nanos = time.nanosecond();
    time.with_nanosecond(nanos - nanos % step).unwrap_or(time)
}

/// Fixed-width ASCII decimal field
fn digits(field: &str) -> Option<u32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
