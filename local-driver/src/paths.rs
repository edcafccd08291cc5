//! On-disk layout of the driver's root directory.
//!
//! ```text
//! <root>/_volumes/<volume_id>   persistent volume data
//! <root>/_mounts/<volume_id>    symlink to the above, present while mounted
//! ```

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DriverError, Result};
use crate::fs::{DIR_MODE, FileSystem};
use crate::types::VolumeId;

pub const VOLUMES_DIR: &str = "_volumes";
pub const MOUNTS_DIR: &str = "_mounts";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathScheme {
    volumes_root: PathBuf,
    mounts_root: PathBuf,
}

impl PathScheme {
    /// Build the scheme for an already-absolute `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            volumes_root: root.join(VOLUMES_DIR),
            mounts_root: root.join(MOUNTS_DIR),
        }
    }

    /// Resolve `root` to an absolute path and create both root directories.
    pub fn prepare<F: FileSystem + ?Sized>(fs: &F, root: &Path) -> Result<Self> {
        let root = fs
            .abs(root)
            .map_err(|e| DriverError::io("Failed to resolve driver root", e))?;
        let scheme = Self::new(&root);

        fs.create_dir_all(&scheme.volumes_root, DIR_MODE)
            .map_err(|e| DriverError::io("Failed to create volumes root", e))?;
        fs.create_dir_all(&scheme.mounts_root, DIR_MODE)
            .map_err(|e| DriverError::io("Failed to create mounts root", e))?;

        info!(
            volumes_root = %scheme.volumes_root.display(),
            mounts_root = %scheme.mounts_root.display(),
            "Driver root prepared"
        );
        Ok(scheme)
    }

    pub fn volumes_root(&self) -> &Path {
        &self.volumes_root
    }

    pub fn mounts_root(&self) -> &Path {
        &self.mounts_root
    }

    /// Persistent data directory of a volume.
    pub fn volume_path(&self, id: &VolumeId) -> PathBuf {
        self.volumes_root.join(id.as_str())
    }

    /// Mount-point symlink of a volume.
    pub fn mount_path(&self, id: &VolumeId) -> PathBuf {
        self.mounts_root.join(id.as_str())
    }
}
