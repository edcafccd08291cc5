//! Passcode protection for volumes.
//!
//! A volume created with a passcode can only be mounted by requests that
//! present the same passcode. Only the SHA-256 digest is retained.

use std::fmt;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{DriverError, Result};
use crate::types::SuppliedPasscode;

type PasscodeDigest = [u8; 32];

fn digest(passcode: &str) -> PasscodeDigest {
    let mut hasher = Sha256::new();
    hasher.update(passcode.as_bytes());
    hasher.finalize().into()
}

#[derive(Clone, PartialEq, Eq, Default)]
pub struct AccessGate {
    digest: Option<PasscodeDigest>,
}

impl AccessGate {
    /// Gate for a volume without a passcode.
    pub fn open() -> Self {
        Self { digest: None }
    }

    pub fn protected(passcode: &str) -> Self {
        Self {
            digest: Some(digest(passcode)),
        }
    }

    pub fn from_passcode(passcode: Option<&str>) -> Self {
        passcode.map_or_else(Self::open, Self::protected)
    }

    pub fn is_protected(&self) -> bool {
        self.digest.is_some()
    }

    /// Decide whether a mount of `volume_name` presenting `supplied` may proceed.
    pub fn check(&self, volume_name: &str, supplied: &SuppliedPasscode) -> Result<()> {
        let Some(expected) = &self.digest else {
            return Ok(());
        };

        match supplied {
            SuppliedPasscode::Absent => Err(DriverError::PasscodeRequired(volume_name.to_string())),
            SuppliedPasscode::NotString => Err(DriverError::PasscodeNotString),
            SuppliedPasscode::Given(passcode) => {
                if bool::from(expected[..].ct_eq(&digest(passcode)[..])) {
                    Ok(())
                } else {
                    Err(DriverError::AccessDenied(volume_name.to_string()))
                }
            }
        }
    }
}

impl fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.digest {
            None => write!(f, "AccessGate(open)"),
            Some(d) => write!(f, "AccessGate(sha256:{})", hex::encode(&d[..4])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSCODE: &str = "aPassc0de";

    #[test]
    fn test_open_gate_ignores_options() {
        let gate = AccessGate::open();
        assert!(!gate.is_protected());
        assert!(gate.check("vol", &SuppliedPasscode::Absent).is_ok());
        assert!(gate.check("vol", &SuppliedPasscode::NotString).is_ok());
        assert!(
            gate.check("vol", &SuppliedPasscode::Given("anything".into()))
                .is_ok()
        );
    }

    #[test]
    fn test_protected_gate_requires_passcode() {
        let gate = AccessGate::protected(PASSCODE);
        let err = gate.check("vol", &SuppliedPasscode::Absent).unwrap_err();
        assert_eq!(err.to_string(), "Volume vol requires a passcode");
    }

    #[test]
    fn test_protected_gate_rejects_non_string() {
        let gate = AccessGate::protected(PASSCODE);
        let err = gate.check("vol", &SuppliedPasscode::NotString).unwrap_err();
        assert_eq!(err.to_string(), "Opts.passcode must be a string value");
    }

    #[test]
    fn test_protected_gate_rejects_wrong_passcode() {
        let gate = AccessGate::protected(PASSCODE);
        let err = gate
            .check("vol", &SuppliedPasscode::Given("wrong".into()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Volume vol access denied");
    }

    #[test]
    fn test_passcode_differing_in_last_byte_is_denied() {
        let gate = AccessGate::protected(PASSCODE);
        let err = gate
            .check("vol", &SuppliedPasscode::Given("aPassc0dE".into()))
            .unwrap_err();
        assert!(matches!(err, DriverError::AccessDenied(_)));
    }

    #[test]
    fn test_protected_gate_accepts_matching_passcode() {
        let gate = AccessGate::protected(PASSCODE);
        assert!(
            gate.check("vol", &SuppliedPasscode::Given(PASSCODE.into()))
                .is_ok()
        );
    }

    #[test]
    fn test_empty_passcode_still_protects() {
        let gate = AccessGate::from_passcode(Some(""));
        assert!(gate.is_protected());
        assert!(gate.check("vol", &SuppliedPasscode::Given(String::new())).is_ok());
        assert!(gate.check("vol", &SuppliedPasscode::Absent).is_err());
    }

    #[test]
    fn test_debug_does_not_leak_passcode() {
        let debug = format!("{:?}", AccessGate::protected(PASSCODE));
        assert!(debug.starts_with("AccessGate(sha256:"));
        assert!(!debug.contains(PASSCODE));
    }
}
