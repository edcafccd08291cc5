//! Local volume driver facade.
//!
//! Implements the plugin lifecycle operations on top of the registry and the
//! mount coordinator. All state lives behind one mutex, so every call is
//! atomic with respect to the registry.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, instrument, warn};

use crate::error::{DriverError, ErrorKind, Result};
use crate::fs::{FileSystem, OsFileSystem};
use crate::metrics::{self, OperationTimer};
use crate::mount::MountCoordinator;
use crate::paths::PathScheme;
use crate::protocol::{
    ActivateResponse, Capabilities, CapabilitiesResponse, CreateRequest, ErrorResponse, GetRequest,
    GetResponse, ListResponse, MountRequest, MountResponse, PathRequest, PathResponse,
    RemoveRequest, UnmountRequest, VOLUME_DRIVER_CAPABILITY, VolumeInfo,
};
use crate::registry::{CreateOutcome, VolumeRegistry};
use crate::types::{CreateOptions, MountOptions};

/// Volume scope reported to the orchestrator: volumes live on this node only.
pub const VOLUME_SCOPE: &str = "local";

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub struct LocalDriver<F: FileSystem = OsFileSystem> {
    fs: F,
    paths: PathScheme,
    registry: Mutex<VolumeRegistry>,
}

impl LocalDriver<OsFileSystem> {
    /// Driver over the real filesystem rooted at `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Result<Self> {
        Self::new(OsFileSystem, root)
    }
}

impl<F: FileSystem> LocalDriver<F> {
    /// Create a driver, resolving `root` and creating its directory layout.
    pub fn new(fs: F, root: impl AsRef<Path>) -> Result<Self> {
        let paths = PathScheme::prepare(&fs, root.as_ref())?;
        Ok(Self {
            fs,
            paths,
            registry: Mutex::new(VolumeRegistry::new()),
        })
    }

    pub fn paths(&self) -> &PathScheme {
        &self.paths
    }

    // Every operation leaves the registry consistent before it can fail, so a
    // poisoned lock still guards valid state.
    fn registry(&self) -> MutexGuard<'_, VolumeRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mounts(&self) -> MountCoordinator<'_, F> {
        MountCoordinator::new(&self.fs, &self.paths)
    }

    /// Run `op` under the registry lock, recording its outcome.
    fn run<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&mut VolumeRegistry) -> Result<T>,
    ) -> Result<T> {
        let timer = OperationTimer::new(operation);
        let mut registry = self.registry();
        let result = op(&mut registry);
        metrics::set_volume_counts(registry.len(), registry.mounted_count());
        drop(registry);

        if let Err(e) = &result {
            match e.kind() {
                ErrorKind::Io | ErrorKind::Inconsistent => {
                    error!(operation, error = %e, "Operation failed")
                }
                _ => warn!(operation, error = %e, "Operation rejected"),
            }
        }
        timer.finish(&result);
        result
    }

    pub fn activate(&self) -> ActivateResponse {
        ActivateResponse {
            implements: vec![VOLUME_DRIVER_CAPABILITY.to_string()],
        }
    }

    pub fn capabilities(&self) -> CapabilitiesResponse {
        CapabilitiesResponse {
            capabilities: Capabilities {
                scope: VOLUME_SCOPE.to_string(),
            },
        }
    }

    #[instrument(skip(self, req), fields(volume = %req.name))]
    pub fn create(&self, req: &CreateRequest) -> ErrorResponse {
        let result = self.run("create", |registry| {
            let opts = CreateOptions::from_opts(&req.opts)?;
            registry.create(&self.fs, &self.paths, &req.name, opts)
        });

        match result {
            Ok(CreateOutcome::Created | CreateOutcome::AlreadyExists) => ErrorResponse::ok(),
            Err(e) => ErrorResponse::from_error(e),
        }
    }

    #[instrument(skip(self, req), fields(volume = %req.name))]
    pub fn mount(&self, req: &MountRequest) -> MountResponse {
        let result = self.run("mount", |registry| {
            let opts = MountOptions::from_opts(&req.opts);
            let record = registry
                .get_mut(&req.name)
                .ok_or_else(|| DriverError::NotCreated(req.name.clone()))?;
            self.mounts().mount(record, &opts.passcode)
        });

        match result {
            Ok(mountpoint) => MountResponse {
                mountpoint: path_string(&mountpoint),
                err: String::new(),
            },
            Err(e) => MountResponse {
                mountpoint: String::new(),
                err: e.to_string(),
            },
        }
    }

    #[instrument(skip(self, req), fields(volume = %req.name))]
    pub fn unmount(&self, req: &UnmountRequest) -> ErrorResponse {
        let result = self.run("unmount", |registry| {
            let record = registry
                .get_mut(&req.name)
                .ok_or_else(|| DriverError::NamedVolumeNotFound(req.name.clone()))?;
            self.mounts().unmount(record)
        });

        match result {
            Ok(()) => ErrorResponse::ok(),
            Err(e) => ErrorResponse::from_error(e),
        }
    }

    /// Mount-point of a mounted volume.
    ///
    /// An existing volume that is not mounted has no path to report and is
    /// answered with the not-mounted error.
    #[instrument(skip(self, req), fields(volume = %req.name))]
    pub fn path(&self, req: &PathRequest) -> PathResponse {
        let result = self.run("path", |registry| {
            let record = registry.get(&req.name).ok_or(DriverError::VolumeNotFound)?;
            record
                .mountpoint(&self.paths)
                .ok_or(DriverError::NotMounted)
        });

        match result {
            Ok(mountpoint) => PathResponse {
                mountpoint: path_string(&mountpoint),
                err: String::new(),
            },
            Err(e) => PathResponse {
                mountpoint: String::new(),
                err: e.to_string(),
            },
        }
    }

    #[instrument(skip(self, req), fields(volume = %req.name))]
    pub fn get(&self, req: &GetRequest) -> GetResponse {
        let result = self.run("get", |registry| {
            let record = registry.get(&req.name).ok_or(DriverError::VolumeNotFound)?;
            Ok(VolumeInfo {
                name: record.name.clone(),
                mountpoint: record
                    .mountpoint(&self.paths)
                    .map(|p| path_string(&p))
                    .unwrap_or_default(),
            })
        });

        match result {
            Ok(volume) => GetResponse {
                volume,
                err: String::new(),
            },
            Err(e) => GetResponse {
                volume: VolumeInfo::default(),
                err: e.to_string(),
            },
        }
    }

    #[instrument(skip(self))]
    pub fn list(&self) -> ListResponse {
        let result = self.run("list", |registry| {
            Ok(registry
                .iter()
                .map(|record| VolumeInfo {
                    name: record.name.clone(),
                    mountpoint: record
                        .mountpoint(&self.paths)
                        .map(|p| path_string(&p))
                        .unwrap_or_default(),
                })
                .collect::<Vec<_>>())
        });

        match result {
            Ok(volumes) => ListResponse {
                volumes,
                err: String::new(),
            },
            Err(e) => ListResponse {
                volumes: Vec::new(),
                err: e.to_string(),
            },
        }
    }

    #[instrument(skip(self, req), fields(volume = %req.name))]
    pub fn remove(&self, req: &RemoveRequest) -> ErrorResponse {
        let result = self.run("remove", |registry| {
            registry.remove(&self.mounts(), &req.name)
        });

        match result {
            Ok(()) => ErrorResponse::ok(),
            Err(e) => ErrorResponse::from_error(e),
        }
    }
}
