//! Prometheus metrics for the local volume driver
//!
//! Operation counters and latencies, plus gauges for the registry size.
//! Recording is a no-op until [`init_metrics`] installs an exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use crate::error::DriverError;

/// Metric names
pub mod names {
    /// Counter: Total lifecycle operations by type and status
    pub const OPERATIONS_TOTAL: &str = "localdriver_operations_total";
    /// Histogram: Duration of lifecycle operations in seconds
    pub const OPERATION_DURATION_SECONDS: &str = "localdriver_operation_duration_seconds";
    /// Gauge: Number of registered volumes
    pub const VOLUMES_TOTAL: &str = "localdriver_volumes_total";
    /// Gauge: Number of volumes with at least one mount
    pub const MOUNTED_VOLUMES: &str = "localdriver_mounted_volumes";
}

/// Initialize the Prometheus metrics exporter
///
/// Starts an HTTP server on the specified address that serves metrics
/// at the `/metrics` endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on http://{}/metrics", addr);
    Ok(())
}

/// Record a lifecycle operation with its result
pub fn record_operation(operation: &str, status: &str, duration_secs: f64) {
    counter!(names::OPERATIONS_TOTAL, "operation" => operation.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!(names::OPERATION_DURATION_SECONDS, "operation" => operation.to_string())
        .record(duration_secs);
}

/// Publish the registry size
pub fn set_volume_counts(total: usize, mounted: usize) {
    gauge!(names::VOLUMES_TOTAL).set(total as f64);
    gauge!(names::MOUNTED_VOLUMES).set(mounted as f64);
}

/// Helper for timing operations
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    /// Complete the operation, labelling failures by error kind
    pub fn finish<T>(self, result: &Result<T, DriverError>) {
        let duration = self.start.elapsed().as_secs_f64();
        let status = match result {
            Ok(_) => "success",
            Err(e) => e.kind().as_str(),
        };
        record_operation(self.operation, status, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_timer_without_exporter() {
        let timer = OperationTimer::new("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(10));
        // No recorder installed: finishing must simply not panic
        timer.finish::<()>(&Err(DriverError::VolumeNotFound));
        OperationTimer::new("test_operation").finish(&Ok(()));
    }
}
