use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use local_driver::discovery;
use local_driver::metrics;
use local_driver::{ListenEndpoint, LocalDriver};

#[derive(Parser, Debug)]
#[command(name = "local-driver")]
#[command(about = "Local directory volume plugin")]
struct Args {
    /// Directory holding the _volumes and _mounts trees
    #[arg(long, env = "LOCAL_DRIVER_ROOT", default_value = "/var/lib/local-driver")]
    root: PathBuf,

    /// Plugin API endpoint (unix:///path.sock or tcp://host:port)
    #[arg(
        long,
        env = "LOCAL_DRIVER_LISTEN",
        default_value = "unix:///run/docker/plugins/localdriver.sock"
    )]
    listen: ListenEndpoint,

    /// Plugin name used in discovery files
    #[arg(long, env = "LOCAL_DRIVER_NAME", default_value = "localdriver")]
    driver_name: String,

    /// Directory for <driver-name>.json discovery specs (TCP endpoints only)
    #[arg(long, env = "LOCAL_DRIVER_PLUGINS_DIR")]
    plugins_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Prometheus metrics HTTP address (e.g., 0.0.0.0:9091)
    /// If not set, metrics endpoint is disabled
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(addr) = args.metrics_addr {
        if let Err(e) = metrics::init_metrics(addr) {
            return Err(format!("Failed to initialize metrics: {}", e).into());
        }
    }

    info!("Starting local-driver on {}", args.listen);
    info!("Log level: {}", args.log_level);
    info!("Driver root: {}", args.root.display());

    let driver = Arc::new(LocalDriver::with_root(&args.root)?);

    let spec_dir = match (&args.listen, &args.plugins_dir) {
        (ListenEndpoint::Tcp(addr), Some(dir)) => {
            discovery::write_plugin_spec(dir, &args.driver_name, *addr).await?;
            Some(dir.clone())
        }
        (ListenEndpoint::Unix(_), Some(dir)) => {
            info!(
                "Ignoring plugins dir {}: unix socket endpoints need no spec file",
                dir.display()
            );
            None
        }
        _ => None,
    };

    local_driver::serve(driver, &args.listen, async {
        shutdown_signal().await;
        info!("Shutdown signal received, draining connections...");
    })
    .await?;

    if let Some(dir) = spec_dir {
        if let Err(e) = discovery::remove_plugin_spec(&dir, &args.driver_name).await {
            error!("Failed to remove plugin spec: {}", e);
        }
    }

    info!("local-driver shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM, SIGINT, or SIGHUP)
async fn shutdown_signal() {
    use signal::unix::{Signal, SignalKind, signal};

    fn install(kind: SignalKind, name: &str) -> Option<Signal> {
        match signal(kind) {
            Ok(s) => Some(s),
            Err(e) => {
                error!("Failed to install {} handler: {}", name, e);
                None
            }
        }
    }

    async fn recv(sig: Option<Signal>) {
        match sig {
            Some(mut sig) => {
                sig.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    let sigterm = install(SignalKind::terminate(), "SIGTERM");
    let sigint = install(SignalKind::interrupt(), "SIGINT");
    let sighup = install(SignalKind::hangup(), "SIGHUP");

    tokio::select! {
        _ = recv(sigterm) => info!("Received SIGTERM"),
        _ = recv(sigint) => info!("Received SIGINT"),
        _ = recv(sighup) => info!("Received SIGHUP, shutting down"),
    }
}
