//! HTTP/JSON transport for the volume plugin protocol.
//!
//! Every method is a `POST` to `/<Interface>.<Method>` with a JSON body. The
//! orchestrator sends bodies with a vendor content type (and sometimes none at
//! all), so bodies are decoded from raw bytes rather than through `Json`.

use std::fmt::{self, Display};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::{TcpListener, UnixListener};
use tracing::{debug, info, warn};

use crate::driver::LocalDriver;
use crate::fs::FileSystem;
use crate::protocol::{
    CreateRequest, ErrorResponse, GetRequest, MountRequest, PathRequest, PluginResponse,
    RemoveRequest, UnmountRequest,
};

pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1.2+json";

// ============================================================================
// Listen endpoint
// ============================================================================

/// Where the plugin API listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenEndpoint {
    /// `unix:///run/docker/plugins/<name>.sock`
    Unix(PathBuf),
    /// `tcp://127.0.0.1:9750` or a bare `127.0.0.1:9750`
    Tcp(SocketAddr),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid listen endpoint '{endpoint}': {reason}")]
pub struct EndpointParseError {
    endpoint: String,
    reason: String,
}

impl FromStr for ListenEndpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| EndpointParseError {
            endpoint: s.to_string(),
            reason,
        };

        if let Some(path) = s.strip_prefix("unix://") {
            if !path.starts_with('/') {
                return Err(invalid("unix socket path must be absolute".into()));
            }
            return Ok(ListenEndpoint::Unix(PathBuf::from(path)));
        }

        let addr = s.strip_prefix("tcp://").unwrap_or(s);
        addr.parse::<SocketAddr>()
            .map(ListenEndpoint::Tcp)
            .map_err(|e| invalid(e.to_string()))
    }
}

impl Display for ListenEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenEndpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            ListenEndpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// A protocol response body.
///
/// Answers 200 when `Err` is empty and 500 otherwise, always with the plugin
/// content type.
pub struct PluginJson<T>(pub T);

impl<T: Serialize + PluginResponse> IntoResponse for PluginJson<T> {
    fn into_response(self) -> Response {
        let status = if self.0.err().is_empty() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        match serde_json::to_vec(&self.0) {
            Ok(body) => (status, [(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)], body).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        }
    }
}

/// Decode a request body. An empty body is an empty request.
fn decode<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Rejecting malformed plugin request");
        (
            StatusCode::BAD_REQUEST,
            PluginJson(ErrorResponse::from_error(format!(
                "Invalid request body: {}",
                e
            ))),
        )
            .into_response()
    })
}

fn handle<Req, Resp>(body: &Bytes, op: impl FnOnce(&Req) -> Resp) -> Response
where
    Req: DeserializeOwned + Default,
    Resp: Serialize + PluginResponse,
{
    match decode::<Req>(body) {
        Ok(req) => PluginJson(op(&req)).into_response(),
        Err(rejection) => rejection,
    }
}

// ============================================================================
// Handlers
// ============================================================================

type SharedDriver<F> = Arc<LocalDriver<F>>;

async fn activate<F: FileSystem + 'static>(State(driver): State<SharedDriver<F>>) -> Response {
    PluginJson(driver.activate()).into_response()
}

async fn capabilities<F: FileSystem + 'static>(
    State(driver): State<SharedDriver<F>>,
) -> Response {
    PluginJson(driver.capabilities()).into_response()
}

async fn create<F: FileSystem + 'static>(
    State(driver): State<SharedDriver<F>>,
    body: Bytes,
) -> Response {
    handle(&body, |req: &CreateRequest| driver.create(req))
}

async fn mount<F: FileSystem + 'static>(
    State(driver): State<SharedDriver<F>>,
    body: Bytes,
) -> Response {
    handle(&body, |req: &MountRequest| driver.mount(req))
}

async fn unmount<F: FileSystem + 'static>(
    State(driver): State<SharedDriver<F>>,
    body: Bytes,
) -> Response {
    handle(&body, |req: &UnmountRequest| driver.unmount(req))
}

async fn path<F: FileSystem + 'static>(
    State(driver): State<SharedDriver<F>>,
    body: Bytes,
) -> Response {
    handle(&body, |req: &PathRequest| driver.path(req))
}

async fn get<F: FileSystem + 'static>(
    State(driver): State<SharedDriver<F>>,
    body: Bytes,
) -> Response {
    handle(&body, |req: &GetRequest| driver.get(req))
}

async fn list<F: FileSystem + 'static>(State(driver): State<SharedDriver<F>>) -> Response {
    PluginJson(driver.list()).into_response()
}

async fn remove<F: FileSystem + 'static>(
    State(driver): State<SharedDriver<F>>,
    body: Bytes,
) -> Response {
    handle(&body, |req: &RemoveRequest| driver.remove(req))
}

async fn unknown_method(uri: Uri) -> Response {
    debug!(path = %uri.path(), "Unknown plugin method");
    (
        StatusCode::NOT_FOUND,
        PluginJson(ErrorResponse::from_error(format!(
            "Unsupported plugin method: {}",
            uri.path()
        ))),
    )
        .into_response()
}

/// Build the plugin API router.
pub fn router<F: FileSystem + 'static>(driver: SharedDriver<F>) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate::<F>))
        .route("/VolumeDriver.Capabilities", post(capabilities::<F>))
        .route("/VolumeDriver.Create", post(create::<F>))
        .route("/VolumeDriver.Mount", post(mount::<F>))
        .route("/VolumeDriver.Unmount", post(unmount::<F>))
        .route("/VolumeDriver.Path", post(path::<F>))
        .route("/VolumeDriver.Get", post(get::<F>))
        .route("/VolumeDriver.List", post(list::<F>))
        .route("/VolumeDriver.Remove", post(remove::<F>))
        .fallback(unknown_method)
        .with_state(driver)
}

// ============================================================================
// Serving
// ============================================================================

/// Remove a leftover socket file from a previous run.
async fn clear_stale_socket(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!(socket = %path.display(), "Removed stale socket");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Serve the plugin API on `endpoint` until `shutdown` resolves.
pub async fn serve<F, S>(
    driver: SharedDriver<F>,
    endpoint: &ListenEndpoint,
    shutdown: S,
) -> io::Result<()>
where
    F: FileSystem + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    let app = router(driver);

    match endpoint {
        ListenEndpoint::Unix(path) => {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            clear_stale_socket(path).await?;

            let listener = UnixListener::bind(path)?;
            info!("Plugin API listening on {}", endpoint);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await?;

            clear_stale_socket(path).await
        }
        ListenEndpoint::Tcp(addr) => {
            let listener = TcpListener::bind(addr).await?;
            info!("Plugin API listening on {}", endpoint);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
        }
    }
}
