//! Metrics collection and exposition.
//!
//! # Metrics
//! - `plugin_requests_total` (counter): requests by method, status, route
//! - `plugin_request_duration_seconds` (histogram): time to response headers
//! - `plugin_launches_total` (counter): chain link launches by plugin, result
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed; `proxy-chain` installs the Prometheus exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Where a request was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteLabel {
    Target,
    NextLink,
}

impl RouteLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteLabel::Target => "target",
            RouteLabel::NextLink => "next_link",
        }
    }
}

/// Install the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: RouteLabel, start: Instant) {
    metrics::counter!(
        "plugin_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.as_str()
    )
    .increment(1);
    metrics::histogram!("plugin_request_duration_seconds", "route" => route.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_launch(plugin: &str, success: bool) {
    let result = if success { "ok" } else { "error" };
    metrics::counter!(
        "plugin_launches_total",
        "plugin" => plugin.to_string(),
        "result" => result
    )
    .increment(1);
}
