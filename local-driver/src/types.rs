//! Type-safe wrappers for volume identifiers and request options.
//!
//! Plugin requests carry a loosely typed `Opts` JSON object. The types here
//! parse it once at the facade boundary so the registry and mount logic only
//! ever see validated values.

use std::fmt::{self, Display};

use serde_json::Value;

use crate::error::{DriverError, Result};

/// The option bag attached to create and mount requests.
pub type Opts = serde_json::Map<String, Value>;

pub const VOLUME_ID_OPT: &str = "volume_id";
pub const PASSCODE_OPT: &str = "passcode";

// ============================================================================
// VolumeId
// ============================================================================

/// Caller-supplied identifier that names the volume's physical directory.
///
/// Only alphanumerics, underscores, hyphens and periods are accepted, and
/// `..` is rejected, so an ID always maps to a single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeId(String);

impl VolumeId {
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason: &str| DriverError::InvalidVolumeId {
            id: s.to_string(),
            reason: reason.to_string(),
        };

        if s.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if s == "." || s.contains("..") {
            return Err(invalid("path traversal not allowed"));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(invalid(
                "only alphanumeric, underscore, hyphen, and period allowed",
            ));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Passcode option
// ============================================================================

/// The `passcode` option as it appeared in a request.
///
/// Kept unvalidated so that mounts of unprotected volumes never reject a
/// request over an option they do not use.
#[derive(Clone, PartialEq, Eq)]
pub enum SuppliedPasscode {
    Absent,
    NotString,
    Given(String),
}

impl SuppliedPasscode {
    pub fn from_opts(opts: &Opts) -> Self {
        match opts.get(PASSCODE_OPT) {
            None => SuppliedPasscode::Absent,
            Some(Value::String(s)) => SuppliedPasscode::Given(s.clone()),
            Some(_) => SuppliedPasscode::NotString,
        }
    }

    /// Strict form used at creation time: absent is fine, a non-string is not.
    pub fn into_optional(self) -> Result<Option<String>> {
        match self {
            SuppliedPasscode::Absent => Ok(None),
            SuppliedPasscode::NotString => Err(DriverError::PasscodeNotString),
            SuppliedPasscode::Given(s) => Ok(Some(s)),
        }
    }
}

impl fmt::Debug for SuppliedPasscode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppliedPasscode::Absent => write!(f, "Absent"),
            SuppliedPasscode::NotString => write!(f, "NotString"),
            SuppliedPasscode::Given(_) => write!(f, "Given(<redacted>)"),
        }
    }
}

// ============================================================================
// Request options
// ============================================================================

/// Validated options of a create request.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub volume_id: VolumeId,
    pub passcode: Option<String>,
}

impl CreateOptions {
    pub fn from_opts(opts: &Opts) -> Result<Self> {
        let volume_id = match opts.get(VOLUME_ID_OPT) {
            Some(Value::String(id)) => VolumeId::parse(id)?,
            _ => return Err(DriverError::MissingVolumeId),
        };
        let passcode = SuppliedPasscode::from_opts(opts).into_optional()?;
        Ok(Self {
            volume_id,
            passcode,
        })
    }
}

/// Options of a mount request.
#[derive(Debug, Clone)]
pub struct MountOptions {
    pub passcode: SuppliedPasscode,
}

impl MountOptions {
    pub fn from_opts(opts: &Opts) -> Self {
        Self {
            passcode: SuppliedPasscode::from_opts(opts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(value: Value) -> Opts {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    #[test]
    fn test_volume_id_accepts_safe_names() {
        for id in ["test-volume-id", "something_different_than_test", "v1.2", "A"] {
            assert!(VolumeId::parse(id).is_ok(), "'{}' should be valid", id);
        }
    }

    #[test]
    fn test_volume_id_rejects_unsafe_names() {
        for id in ["", ".", "..", "a/b", "../etc", "vol name", "vol;rm", "$(id)"] {
            let err = VolumeId::parse(id).unwrap_err();
            assert!(
                matches!(err, DriverError::InvalidVolumeId { .. }),
                "'{}' should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_volume_id_display() {
        let id = VolumeId::parse("test-volume-id").unwrap();
        assert_eq!(id.as_str(), "test-volume-id");
        assert_eq!(id.to_string(), "test-volume-id");
    }

    #[test]
    fn test_create_options_missing_volume_id() {
        let err = CreateOptions::from_opts(&opts(json!({"nonsense": "bla"}))).unwrap_err();
        assert_eq!(err.to_string(), "Missing mandatory 'volume_id' field in 'Opts'");
    }

    #[test]
    fn test_create_options_non_string_volume_id_is_missing() {
        let err = CreateOptions::from_opts(&opts(json!({"volume_id": 42}))).unwrap_err();
        assert!(matches!(err, DriverError::MissingVolumeId));
    }

    #[test]
    fn test_create_options_null_passcode() {
        let err = CreateOptions::from_opts(&opts(json!({
            "volume_id": "something_different_than_test",
            "passcode": null,
        })))
        .unwrap_err();
        assert_eq!(err.to_string(), "Opts.passcode must be a string value");
    }

    #[test]
    fn test_create_options_with_passcode() {
        let parsed = CreateOptions::from_opts(&opts(json!({
            "volume_id": "test-volume-id",
            "passcode": "aPassc0de",
        })))
        .unwrap();
        assert_eq!(parsed.volume_id.as_str(), "test-volume-id");
        assert_eq!(parsed.passcode.as_deref(), Some("aPassc0de"));
    }

    #[test]
    fn test_mount_options_classify_passcode() {
        assert_eq!(
            MountOptions::from_opts(&Opts::new()).passcode,
            SuppliedPasscode::Absent
        );
        assert_eq!(
            MountOptions::from_opts(&opts(json!({"passcode": 7}))).passcode,
            SuppliedPasscode::NotString
        );
        assert_eq!(
            MountOptions::from_opts(&opts(json!({"passcode": "x"}))).passcode,
            SuppliedPasscode::Given("x".to_string())
        );
    }

    #[test]
    fn test_supplied_passcode_debug_is_redacted() {
        let debug = format!("{:?}", SuppliedPasscode::Given("aPassc0de".to_string()));
        assert!(!debug.contains("aPassc0de"));
    }
}
