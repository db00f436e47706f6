//! Metrics collection and exposition.
//!
//! # Metrics
//! - `scrape_proxy_scrapes_total` (counter): relays by outcome and caller-facing status
//! - `scrape_proxy_scrape_duration_seconds` (histogram): time until the scrape was classified

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one relay.
pub fn record_scrape(outcome: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "scrape_proxy_scrapes_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!("scrape_proxy_scrape_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}
