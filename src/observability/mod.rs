//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Relay dispatcher and scraper produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (scrape counters and latency histogram)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus exporter endpoint
//! ```
//!
//! # Design Decisions
//! - Request ID flows into every failure log
//! - Metrics are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
