//! Request and response bodies of the volume plugin protocol.
//!
//! Field names follow the protocol's PascalCase JSON. Every response carries
//! an `Err` string which is empty on success.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::Opts;

/// Capability reported by [`ActivateResponse`].
pub const VOLUME_DRIVER_CAPABILITY: &str = "VolumeDriver";

/// `Opts` may be omitted or explicitly `null`; both mean "no options".
fn null_as_empty<'de, D>(deserializer: D) -> Result<Opts, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Opts>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub opts: Opts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountRequest {
    #[serde(default)]
    pub name: String,
    /// Caller-side mount identifier; accepted and ignored.
    #[serde(default, rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub opts: Opts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountResponse {
    pub mountpoint: String,
    pub err: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnmountRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PathRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PathResponse {
    pub mountpoint: String,
    pub err: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeInfo {
    pub name: String,
    pub mountpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    pub volume: VolumeInfo,
    pub err: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListResponse {
    pub volumes: Vec<VolumeInfo>,
    pub err: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoveRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    pub err: String,
}

impl ErrorResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn from_error(err: impl ToString) -> Self {
        Self {
            err: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Capabilities {
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    pub capabilities: Capabilities,
}

/// Responses that carry the protocol's `Err` field.
pub trait PluginResponse {
    fn err(&self) -> &str;
}

macro_rules! impl_plugin_response {
    ($($ty:ty),* $(,)?) => {
        $(impl PluginResponse for $ty {
            fn err(&self) -> &str {
                &self.err
            }
        })*
    };
}

impl_plugin_response!(MountResponse, PathResponse, GetResponse, ListResponse, ErrorResponse);

impl PluginResponse for ActivateResponse {
    fn err(&self) -> &str {
        ""
    }
}

impl PluginResponse for CapabilitiesResponse {
    fn err(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_uses_pascal_case() {
        let req: CreateRequest = serde_json::from_value(json!({
            "Name": "volume",
            "Opts": {"volume_id": "test-volume-id"},
        }))
        .unwrap();
        assert_eq!(req.name, "volume");
        assert_eq!(req.opts["volume_id"], "test-volume-id");
    }

    #[test]
    fn test_null_or_missing_opts_are_empty() {
        let null: CreateRequest =
            serde_json::from_value(json!({"Name": "v", "Opts": null})).unwrap();
        let missing: MountRequest = serde_json::from_value(json!({"Name": "v"})).unwrap();
        assert!(null.opts.is_empty());
        assert!(missing.opts.is_empty());
    }

    #[test]
    fn test_mount_request_accepts_id() {
        let req: MountRequest =
            serde_json::from_value(json!({"Name": "v", "ID": "abc123"})).unwrap();
        assert_eq!(req.id, "abc123");
    }

    #[test]
    fn test_get_response_shape() {
        let resp = GetResponse {
            volume: VolumeInfo {
                name: "v".to_string(),
                mountpoint: "/mnt/v".to_string(),
            },
            err: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"Volume": {"Name": "v", "Mountpoint": "/mnt/v"}, "Err": ""})
        );
    }

    #[test]
    fn test_activate_response_shape() {
        let resp = ActivateResponse {
            implements: vec![VOLUME_DRIVER_CAPABILITY.to_string()],
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"Implements": ["VolumeDriver"]})
        );
    }

    #[test]
    fn test_error_response_helpers() {
        assert_eq!(ErrorResponse::ok().err(), "");
        let failed = ErrorResponse::from_error("Volume not found");
        assert_eq!(failed.err(), "Volume not found");
    }
}
