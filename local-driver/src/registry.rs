//! Authoritative name → volume record mapping.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::PathBuf;

use tracing::{debug, error, info, instrument};

use crate::access::AccessGate;
use crate::error::{DriverError, Result};
use crate::fs::{DIR_MODE, FileSystem};
use crate::mount::MountCoordinator;
use crate::paths::PathScheme;
use crate::types::{CreateOptions, VolumeId};

/// Bookkeeping for one logical volume.
#[derive(Debug, Clone)]
pub struct VolumeRecord {
    pub name: String,
    pub volume_id: VolumeId,
    pub gate: AccessGate,
    pub(crate) mount_count: u32,
}

impl VolumeRecord {
    fn new(name: &str, opts: CreateOptions) -> Self {
        Self {
            name: name.to_string(),
            volume_id: opts.volume_id,
            gate: AccessGate::from_passcode(opts.passcode.as_deref()),
            mount_count: 0,
        }
    }

    pub fn mount_count(&self) -> u32 {
        self.mount_count
    }

    pub fn is_mounted(&self) -> bool {
        self.mount_count > 0
    }

    /// The mount-point while mounted.
    pub fn mountpoint(&self, paths: &PathScheme) -> Option<PathBuf> {
        self.is_mounted()
            .then(|| paths.mount_path(&self.volume_id))
    }
}

/// Result of a successful create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Default)]
pub struct VolumeRegistry {
    volumes: BTreeMap<String, VolumeRecord>,
}

impl VolumeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a volume, or accept an identical re-create as a no-op.
    ///
    /// The persistent directory is created before the record is inserted, so
    /// a filesystem failure leaves no record behind.
    #[instrument(skip(self, fs, paths, opts), fields(volume_id = %opts.volume_id))]
    pub fn create<F: FileSystem + ?Sized>(
        &mut self,
        fs: &F,
        paths: &PathScheme,
        name: &str,
        opts: CreateOptions,
    ) -> Result<CreateOutcome> {
        if name.is_empty() {
            return Err(DriverError::MissingVolumeName);
        }

        // A volume ID owns one data directory and one mount-point.
        if !self.volumes.contains_key(name) {
            if let Some(owner) = self.owner_of(&opts.volume_id) {
                return Err(DriverError::VolumeIdInUse {
                    id: opts.volume_id.to_string(),
                    owner: owner.name.clone(),
                });
            }
        }

        match self.volumes.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                if existing.get().volume_id != opts.volume_id {
                    return Err(DriverError::VolumeIdConflict(name.to_string()));
                }
                debug!("Volume already exists with the same volume ID");
                Ok(CreateOutcome::AlreadyExists)
            }
            Entry::Vacant(slot) => {
                let volume_path = paths.volume_path(&opts.volume_id);
                if let Err(e) = fs.create_dir_all(&volume_path, DIR_MODE) {
                    error!(path = %volume_path.display(), error = %e, "Failed to create volume directory");
                    return Err(DriverError::io("Failed to create volume directory", e));
                }

                let record = VolumeRecord::new(name, opts);
                info!(
                    path = %volume_path.display(),
                    protected = record.gate.is_protected(),
                    "Volume created"
                );
                slot.insert(record);
                Ok(CreateOutcome::Created)
            }
        }
    }

    fn owner_of(&self, id: &VolumeId) -> Option<&VolumeRecord> {
        self.volumes.values().find(|v| &v.volume_id == id)
    }

    pub fn get(&self, name: &str) -> Option<&VolumeRecord> {
        self.volumes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut VolumeRecord> {
        self.volumes.get_mut(name)
    }

    /// All records ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &VolumeRecord> {
        self.volumes.values()
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn mounted_count(&self) -> usize {
        self.volumes.values().filter(|v| v.is_mounted()).count()
    }

    /// Tear down a volume: release any mount, delete its data, drop the record.
    ///
    /// If deleting the data fails the released mount references are put back
    /// and the record stays registered, so the removal can be retried.
    #[instrument(skip(self, mounts))]
    pub fn remove<F: FileSystem + ?Sized>(
        &mut self,
        mounts: &MountCoordinator<'_, F>,
        name: &str,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(DriverError::MissingVolumeName);
        }

        let Some(record) = self.volumes.get_mut(name) else {
            return Err(DriverError::NamedVolumeNotFound(name.to_string()));
        };

        let held = record.mount_count;
        if held > 0 {
            mounts.release(record)?;
        }
        if let Err(e) = mounts.destroy(record) {
            if let Err(relink) = mounts.reattach(record, held) {
                error!(error = %relink, "Failed to restore mount after aborted removal");
            }
            return Err(e);
        }

        self.volumes.remove(name);
        info!("Volume removed");
        Ok(())
    }
}
