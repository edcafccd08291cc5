//! Filesystem capability consumed by the driver.
//!
//! Everything the driver does to disk goes through [`FileSystem`], so the
//! lifecycle logic can be exercised against a mock without touching a real
//! directory tree. [`OsFileSystem`] is the production implementation.

use std::fs;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Permission bits for volume and root directories (before umask).
pub const DIR_MODE: u32 = 0o777;

/// What a successful [`FileSystem::stat`] found at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Other,
}

#[cfg_attr(test, mockall::automock)]
pub trait FileSystem: Send + Sync {
    /// Resolve `path` to an absolute path without touching the filesystem.
    fn abs(&self, path: &Path) -> io::Result<PathBuf>;

    /// Create `path` and all missing parents. Succeeds if it already exists.
    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Create a symbolic link at `link` pointing to `target`.
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    /// Probe `path`, following symlinks.
    ///
    /// Returns an error of kind [`io::ErrorKind::NotFound`] when nothing (or
    /// only a dangling link) exists there.
    fn stat(&self, path: &Path) -> io::Result<EntryKind>;

    /// Remove `path` and everything below it. Symlinks are removed, not
    /// followed. Succeeds if `path` does not exist.
    fn remove_all(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn abs(&self, path: &Path) -> io::Result<PathBuf> {
        std::path::absolute(path)
    }

    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        debug!(target = %target.display(), link = %link.display(), "Creating symlink");
        std::os::unix::fs::symlink(target, link)
    }

    fn stat(&self, path: &Path) -> io::Result<EntryKind> {
        let metadata = fs::metadata(path)?;
        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        Ok(kind)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        debug!(path = %path.display(), "Removing path");
        if metadata.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_dir_all_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");

        OsFileSystem.create_dir_all(&nested, DIR_MODE).unwrap();
        OsFileSystem.create_dir_all(&nested, DIR_MODE).unwrap();

        assert_eq!(OsFileSystem.stat(&nested).unwrap(), EntryKind::Directory);
    }

    #[test]
    fn test_stat_reports_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = OsFileSystem
            .stat(&temp_dir.path().join("missing"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_stat_follows_dangling_symlink() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target");
        let link = temp_dir.path().join("link");

        OsFileSystem.create_dir_all(&target, DIR_MODE).unwrap();
        OsFileSystem.symlink(&target, &link).unwrap();
        assert_eq!(OsFileSystem.stat(&link).unwrap(), EntryKind::Directory);

        fs::remove_dir(&target).unwrap();
        let err = OsFileSystem.stat(&link).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_all_on_symlink_keeps_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target");
        let link = temp_dir.path().join("link");

        OsFileSystem.create_dir_all(&target, DIR_MODE).unwrap();
        fs::write(target.join("data"), b"payload").unwrap();
        OsFileSystem.symlink(&target, &link).unwrap();

        OsFileSystem.remove_all(&link).unwrap();

        assert!(fs::symlink_metadata(&link).is_err());
        assert!(target.join("data").exists());
    }

    #[test]
    fn test_remove_all_missing_path_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        OsFileSystem
            .remove_all(&temp_dir.path().join("never-existed"))
            .unwrap();
    }

    #[test]
    fn test_abs_keeps_absolute_paths() {
        let abs = OsFileSystem.abs(Path::new("/path/to/mount")).unwrap();
        assert_eq!(abs, PathBuf::from("/path/to/mount"));
    }
}
