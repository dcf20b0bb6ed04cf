//! Main test module for dumpfs
//!
//! This module includes all test suites:
//! - Integration tests over many runs with mutated trees
//! - Chaos tests for damaged inputs and failing operations
//! - Property-based tests for the link/copy decision and naming
//! - Edge cases for unusual entries

pub mod chaos;

#[cfg(test)]
mod edge_cases {
    use ::dumpfs::utils::mirror_path;
    use ::dumpfs::*;
    use std::fs;
    use std::os::unix::fs::MetadataExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn backup(dest: &Path, src: &Path) -> BackupOutcome {
        let mut dumpfs = Dumpfs::new(DumpfsConfig::default());
        dumpfs.backup_with_outcome(dest, &[src]).unwrap()
    }

    fn mkfifo(path: &Path) {
        use rustix::fs::{makedev, mknodat, FileType, Mode, CWD};
        mknodat(CWD, path, FileType::Fifo, Mode::from_bits_truncate(0o644), makedev(0, 0)).unwrap();
    }

    #[test]
    fn test_empty_source_directory() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();

        let outcome = backup(dest.path(), src.path());
        let mirror = mirror_path(&outcome.snapshot, src.path());
        assert!(mirror.is_dir());
        assert_eq!(fs::read_dir(&mirror).unwrap().count(), 0);
        assert_eq!(outcome.stats.files_total(), 0);
    }

    #[test]
    fn test_named_pipe_is_left_out() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        mkfifo(&src.path().join("pipe"));
        fs::write(src.path().join("file"), "content").unwrap();

        let outcome = backup(dest.path(), src.path());
        let mirror = mirror_path(&outcome.snapshot, src.path());
        assert!(!mirror.join("pipe").exists());
        assert!(fs::symlink_metadata(mirror.join("pipe")).is_err());
        assert!(mirror.join("file").exists());
        assert_eq!(outcome.stats.special_skipped, 1);
        assert!(outcome
            .failures
            .iter()
            .all(|f| !f.path.ends_with("pipe")));
    }

    #[test]
    fn test_special_filenames() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let names = [
            "file with spaces.txt",
            "file-with-dashes.txt",
            "file.multiple.dots.txt",
            ".hidden",
            "unicode_文件.txt",
            "emoji_🦀.txt",
            "2024-01-01_00:00:00.000",
        ];
        for name in names {
            fs::write(src.path().join(name), name).unwrap();
        }

        let first = backup(dest.path(), src.path());
        let second = backup(dest.path(), src.path());

        for name in names {
            let a = mirror_path(&first.snapshot, &src.path().join(name));
            let b = mirror_path(&second.snapshot, &src.path().join(name));
            assert_eq!(fs::read_to_string(&b).unwrap(), name);
            assert_eq!(fs::metadata(&a).unwrap().ino(), fs::metadata(&b).unwrap().ino());
        }
    }

    #[test]
    fn test_dangling_symlink_is_preserved() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::os::unix::fs::symlink("/definitely/not/here", src.path().join("dead")).unwrap();

        let outcome = backup(dest.path(), src.path());
        let copy = mirror_path(&outcome.snapshot, &src.path().join("dead"));
        assert_eq!(fs::read_link(&copy).unwrap(), PathBuf::from("/definitely/not/here"));
        assert!(fs::symlink_metadata(&copy).unwrap().file_type().is_symlink());
        assert_eq!(outcome.stats.symlinks_created, 1);
    }

    #[test]
    fn test_symlink_to_directory_is_not_followed() {
        let src = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(outside.path().join("big"), vec![0u8; 4096]).unwrap();
        std::os::unix::fs::symlink(outside.path(), src.path().join("elsewhere")).unwrap();

        let outcome = backup(dest.path(), src.path());
        let copy = mirror_path(&outcome.snapshot, &src.path().join("elsewhere"));
        assert!(fs::symlink_metadata(&copy).unwrap().file_type().is_symlink());
        assert_eq!(outcome.stats.files_copied, 0);
    }

    #[test]
    fn test_empty_and_large_files() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(src.path().join("empty"), b"").unwrap();
        let large: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(src.path().join("large"), &large).unwrap();

        let first = backup(dest.path(), src.path());
        let mut tweaked = large.clone();
        tweaked[299_999] ^= 0xff;
        fs::write(src.path().join("large"), &tweaked).unwrap();
        let second = backup(dest.path(), src.path());

        let ino = |snapshot: &Path, name: &str| {
            fs::metadata(mirror_path(snapshot, &src.path().join(name))).unwrap().ino()
        };
        assert_eq!(ino(&first.snapshot, "empty"), ino(&second.snapshot, "empty"));
        assert_ne!(ino(&first.snapshot, "large"), ino(&second.snapshot, "large"));
        assert_eq!(
            fs::read(mirror_path(&second.snapshot, &src.path().join("large"))).unwrap(),
            tweaked
        );
    }

    #[test]
    fn test_dotted_source_path_is_normalized() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::create_dir(src.path().join("inner")).unwrap();
        fs::write(src.path().join("inner/file"), "x").unwrap();

        let dotted = src.path().join("inner/../inner/.");
        let outcome = backup(dest.path(), &dotted);
        let copy = mirror_path(&outcome.snapshot, &src.path().join("inner/file"));
        assert_eq!(fs::read_to_string(copy).unwrap(), "x");
    }
}
