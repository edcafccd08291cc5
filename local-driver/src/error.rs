use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the volume lifecycle operations.
///
/// The `Display` strings are part of the plugin contract: callers receive
/// them verbatim in the `Err` field of every response.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Missing mandatory 'volume_id' field in 'Opts'")]
    MissingVolumeId,

    #[error("Missing mandatory 'volume_name'")]
    MissingVolumeName,

    #[error("Invalid volume ID '{id}': {reason}")]
    InvalidVolumeId { id: String, reason: String },

    #[error("Opts.passcode must be a string value")]
    PasscodeNotString,

    #[error("Volume not found")]
    VolumeNotFound,

    #[error("Volume '{0}' not found")]
    NamedVolumeNotFound(String),

    #[error("Volume '{0}' must be created before being mounted")]
    NotCreated(String),

    #[error("Volume '{0}' already exists with a different volume ID")]
    VolumeIdConflict(String),

    #[error("Volume ID '{id}' is already used by volume '{owner}'")]
    VolumeIdInUse { id: String, owner: String },

    #[error("Volume {0} requires a passcode")]
    PasscodeRequired(String),

    #[error("Volume {0} access denied")]
    AccessDenied(String),

    #[error("Volume not previously mounted")]
    NotMounted,

    #[error("Volume {name} does not exist (path: {}), nothing to do!", .path.display())]
    StaleMount { name: String, path: PathBuf },

    #[error("Error establishing whether volume exists")]
    ProbeFailed(#[source] io::Error),

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Coarse classification of a [`DriverError`], used for metric labels and
/// log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Conflict,
    AccessDenied,
    FailedPrecondition,
    Inconsistent,
    Io,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::FailedPrecondition => "failed_precondition",
            ErrorKind::Inconsistent => "inconsistent",
            ErrorKind::Io => "io",
        }
    }
}

impl DriverError {
    /// Wrap a filesystem error with the operation it interrupted.
    pub fn io(context: &'static str, source: io::Error) -> Self {
        DriverError::Io { context, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::MissingVolumeId
            | DriverError::MissingVolumeName
            | DriverError::InvalidVolumeId { .. }
            | DriverError::PasscodeNotString => ErrorKind::InvalidArgument,
            DriverError::VolumeNotFound | DriverError::NamedVolumeNotFound(_) => {
                ErrorKind::NotFound
            }
            DriverError::VolumeIdConflict(_) | DriverError::VolumeIdInUse { .. } => {
                ErrorKind::Conflict
            }
            DriverError::PasscodeRequired(_) | DriverError::AccessDenied(_) => {
                ErrorKind::AccessDenied
            }
            DriverError::NotCreated(_) | DriverError::NotMounted => ErrorKind::FailedPrecondition,
            DriverError::StaleMount { .. } | DriverError::ProbeFailed(_) => {
                ErrorKind::Inconsistent
            }
            DriverError::Io { .. } => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_mount_message_names_path() {
        let err = DriverError::StaleMount {
            name: "volumeName".to_string(),
            path: PathBuf::from("/path/to/mount/_mounts/test-volume-id"),
        };
        assert_eq!(
            err.to_string(),
            "Volume volumeName does not exist (path: /path/to/mount/_mounts/test-volume-id), nothing to do!"
        );
        assert_eq!(err.kind(), ErrorKind::Inconsistent);
    }

    #[test]
    fn test_io_error_keeps_context() {
        let err = DriverError::io(
            "Failed to create mount point",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to create mount point: permission denied"
        );
        assert_eq!(err.kind().as_str(), "io");
    }

    #[test]
    fn test_probe_failure_hides_cause_from_message() {
        let err = DriverError::ProbeFailed(io::Error::other("something weird"));
        assert_eq!(err.to_string(), "Error establishing whether volume exists");
    }
}
