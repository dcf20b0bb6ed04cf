//! Utility functions for dumpfs
//!
//! Path manipulation for mirroring absolute source paths beneath a snapshot
//! root, link-aware existence checks and byte formatting.
//!
//! ## Example Usage
//!
//! ```rust
//! use dumpfs::utils::mirror_path;
//! use std::path::{Path, PathBuf};
//!
//! let dest = mirror_path(Path::new("/backup/2024-05-01_12:00:00.000"), Path::new("/home/me/notes.txt"));
//! assert_eq!(dest, PathBuf::from("/backup/2024-05-01_12:00:00.000/home/me/notes.txt"));
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Place an absolute path beneath `root`
///
/// `mirror_path("/snap", "/src/foo")` is `/snap/src/foo`. Root and prefix
/// components of `absolute` are dropped so that joining never replaces `root`.
pub fn mirror_path(root: &Path, absolute: &Path) -> PathBuf {
    let mut mirrored = root.to_path_buf();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {}
            other => mirrored.push(other.as_os_str()),
        }
    }
    mirrored
}

/// Whether anything exists at `path`, counting dangling symlinks
pub fn lexists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Make a path absolute and normal without resolving symlinks
///
/// Relative paths are joined to the current directory, then `.` and `..` are
/// removed lexically, so the result can be mirrored with [`mirror_path`].
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normal = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            other => normal.push(other.as_os_str()),
        }
    }
    Ok(normal)
}

/// Directories from `path` up to, but not including, the filesystem root
///
/// `ancestors_below_root("/a/b/c")` yields `/a/b/c`, `/a/b`, `/a`.
pub fn ancestors_below_root(path: &Path) -> impl Iterator<Item = &Path> {
    path.ancestors().filter(|p| p.parent().is_some())
}

/// Format bytes in human-readable form
///
/// Uses 1024 as the conversion factor.
///
/// ```rust
/// use dumpfs::utils::format_bytes;
///
/// assert_eq!(format_bytes(1023), "1023 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
