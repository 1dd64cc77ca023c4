//! Metrics collection and exposition.
//!
//! # Metrics
//! - `forward_requests_total` (counter): requests by method, status
//! - `forward_failures_total` (counter): failed forwards by stage
//! - `forward_request_duration_seconds` (histogram): time to response headers

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::forward::Stage;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "forward_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("forward_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record a forwarding failure.
pub fn record_failure(stage: Stage) {
    counter!("forward_failures_total", "stage" => stage.as_str()).increment(1);
}
