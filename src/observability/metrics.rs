//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define lifecycle metrics (unit outcomes, shutdown duration)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `lifecycle_units_total` (counter): units by kind (thread/hook) and outcome
//! - `lifecycle_shutdown_duration_seconds` (histogram): time from start to Stopped
//! - `lifecycle_registration_timeouts_total` (counter): threads that never
//!   supplied a shutdown procedure within the registration window
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The exporter is optional and owned by the binary

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_unit_outcome(kind: &'static str, outcome: &'static str) {
    metrics::counter!("lifecycle_units_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_shutdown_duration(elapsed: Duration) {
    metrics::histogram!("lifecycle_shutdown_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_registration_timeout() {
    metrics::counter!("lifecycle_registration_timeouts_total").increment(1);
}
