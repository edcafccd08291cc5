//! Local Volume Driver Library
//!
//! Volume plugin that serves directories under a single root on the host,
//! exposed to containers through per-volume symlinks.
//!
//! The library is split into several modules:
//! - `driver`: the plugin facade answering every protocol method
//! - `registry` and `mount`: volume records and the refcounted mount state
//! - `paths`, `access`, `types`: on-disk layout, passcode gating, options
//! - `server` and `discovery`: HTTP transport and plugin spec files
//! - `metrics`: Prometheus metrics collection

pub mod access;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod fs;
pub mod metrics;
pub mod mount;
pub mod paths;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod types;

pub use driver::LocalDriver;
pub use error::{DriverError, ErrorKind};
pub use fs::{FileSystem, OsFileSystem};
pub use paths::PathScheme;
pub use server::{ListenEndpoint, router, serve};
