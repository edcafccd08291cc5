//! Plugin discovery files.
//!
//! A plugin reachable over TCP announces itself with a `<name>.json` spec in
//! the orchestrator's plugin directory. Unix socket plugins are found by their
//! socket file alone.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("invalid driver name '{0}'")]
    InvalidName(String),
    #[error("failed to write plugin spec {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode plugin spec: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginSpec {
    pub name: String,
    pub addr: String,
}

impl PluginSpec {
    pub fn tcp(name: &str, addr: SocketAddr) -> Self {
        Self {
            name: name.to_string(),
            addr: format!("http://{}", addr),
        }
    }
}

fn validate_driver_name(name: &str) -> Result<(), DiscoveryError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(DiscoveryError::InvalidName(name.to_string()))
    }
}

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> DiscoveryError {
    let path = path.to_path_buf();
    move |source| DiscoveryError::Write { path, source }
}

/// Atomically write `<dir>/<name>.json` announcing a TCP endpoint.
///
/// Returns the path of the written spec.
pub async fn write_plugin_spec(
    dir: &Path,
    name: &str,
    addr: SocketAddr,
) -> Result<PathBuf, DiscoveryError> {
    validate_driver_name(name)?;

    let spec = PluginSpec::tcp(name, addr);
    let content = serde_json::to_vec_pretty(&spec)?;

    let path = dir.join(format!("{}.json", name));
    let temp_path = dir.join(format!("{}.json.new", name));
    tokio::fs::create_dir_all(dir).await.map_err(write_error(dir))?;
    tokio::fs::write(&temp_path, &content)
        .await
        .map_err(write_error(&temp_path))?;
    tokio::fs::rename(&temp_path, &path)
        .await
        .map_err(write_error(&path))?;

    info!(spec = %path.display(), addr = %spec.addr, "Wrote plugin discovery spec");
    Ok(path)
}

/// Remove a spec written by [`write_plugin_spec`]. A missing file is fine.
pub async fn remove_plugin_spec(dir: &Path, name: &str) -> Result<(), DiscoveryError> {
    validate_driver_name(name)?;
    let path = dir.join(format!("{}.json", name));
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(DiscoveryError::Write { path, source }),
    }
}
