//! Reference-counted mount state machine.
//!
//! A record is `Unmounted` at count 0 and `Mounted(n)` for n >= 1. The first
//! mount creates `<root>/_mounts/<id> -> <root>/_volumes/<id>`; the last
//! unmount removes it. Every failure path returns before the record is
//! mutated, so a failed call leaves the count exactly as it was.

use std::io;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::error::{DriverError, Result};
use crate::fs::{DIR_MODE, FileSystem};
use crate::paths::PathScheme;
use crate::registry::VolumeRecord;
use crate::types::SuppliedPasscode;

/// Applies mount-state transitions to records for the duration of one call.
pub struct MountCoordinator<'a, F: ?Sized> {
    fs: &'a F,
    paths: &'a PathScheme,
}

impl<'a, F: FileSystem + ?Sized> MountCoordinator<'a, F> {
    pub fn new(fs: &'a F, paths: &'a PathScheme) -> Self {
        Self { fs, paths }
    }

    /// Take one mount reference, creating the symlink on the first one.
    pub fn mount(
        &self,
        record: &mut VolumeRecord,
        passcode: &SuppliedPasscode,
    ) -> Result<PathBuf> {
        record.gate.check(&record.name, passcode)?;

        let mount_path = self.paths.mount_path(&record.volume_id);
        if record.mount_count == 0 {
            self.link(record)?;
            info!(volume = %record.name, mountpoint = %mount_path.display(), "Volume mounted");
        } else {
            debug!(
                volume = %record.name,
                mount_count = record.mount_count,
                "Volume already mounted, adding reference"
            );
        }

        record.mount_count += 1;
        Ok(mount_path)
    }

    /// Drop one mount reference, removing the symlink with the last one.
    ///
    /// The mount-point is probed first. If it has vanished from disk the
    /// inconsistency is reported and the count is left alone.
    pub fn unmount(&self, record: &mut VolumeRecord) -> Result<()> {
        if record.mount_count == 0 {
            return Err(DriverError::NotMounted);
        }

        let mount_path = self.paths.mount_path(&record.volume_id);
        match self.fs.stat(&mount_path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    volume = %record.name,
                    mountpoint = %mount_path.display(),
                    "Mount point vanished from disk"
                );
                return Err(DriverError::StaleMount {
                    name: record.name.clone(),
                    path: mount_path,
                });
            }
            Err(e) => {
                error!(volume = %record.name, error = %e, "Failed to probe mount point");
                return Err(DriverError::ProbeFailed(e));
            }
        }

        if record.mount_count == 1 {
            self.remove_mount_path(record)?;
            info!(volume = %record.name, "Volume unmounted");
        } else {
            debug!(
                volume = %record.name,
                remaining = record.mount_count - 1,
                "Released mount reference"
            );
        }
        record.mount_count -= 1;
        Ok(())
    }

    /// Drop every mount reference at once, as removal requires.
    pub fn release(&self, record: &mut VolumeRecord) -> Result<()> {
        self.remove_mount_path(record)?;
        if record.mount_count > 1 {
            warn!(
                volume = %record.name,
                mount_count = record.mount_count,
                "Force-releasing outstanding mounts"
            );
        }
        record.mount_count = 0;
        Ok(())
    }

    /// Put back the mount references taken away by [`release`](Self::release).
    pub fn reattach(&self, record: &mut VolumeRecord, mount_count: u32) -> Result<()> {
        if mount_count == 0 {
            return Ok(());
        }
        self.link(record)?;
        record.mount_count = mount_count;
        info!(volume = %record.name, mount_count, "Mount references restored");
        Ok(())
    }

    /// Delete the persistent data of an unmounted record.
    pub fn destroy(&self, record: &VolumeRecord) -> Result<()> {
        debug_assert!(!record.is_mounted());
        let volume_path = self.paths.volume_path(&record.volume_id);
        self.fs.remove_all(&volume_path).map_err(|e| {
            error!(volume = %record.name, path = %volume_path.display(), error = %e, "Failed to remove volume data");
            DriverError::io("Failed removing volume path", e)
        })
    }

    fn link(&self, record: &VolumeRecord) -> Result<()> {
        let volume_path = self.paths.volume_path(&record.volume_id);
        let mount_path = self.paths.mount_path(&record.volume_id);

        self.fs
            .create_dir_all(self.paths.mounts_root(), DIR_MODE)
            .map_err(|e| DriverError::io("Failed to create mount point", e))?;
        self.fs.symlink(&volume_path, &mount_path).map_err(|e| {
            error!(
                volume = %record.name,
                target = %volume_path.display(),
                link = %mount_path.display(),
                error = %e,
                "Failed to create mount symlink"
            );
            DriverError::io("Failed to create mount point", e)
        })
    }

    fn remove_mount_path(&self, record: &VolumeRecord) -> Result<()> {
        let mount_path = self.paths.mount_path(&record.volume_id);
        self.fs.remove_all(&mount_path).map_err(|e| {
            error!(volume = %record.name, mountpoint = %mount_path.display(), error = %e, "Failed to remove mount point");
            DriverError::io("Error unmounting volume", e)
        })
    }
}
