//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scrape::Normalization;

/// `Accept` header sent upstream: OpenMetrics first, then the Prometheus text format.
pub const DEFAULT_ACCEPT: &str =
    "application/openmetrics-text; version=0.0.1,text/plain;version=0.0.4;q=0.5,*/*;q=0.1";

/// Root configuration for the scrape proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, shutdown drain).
    pub listener: ListenerConfig,

    /// Which inbound paths are relayed and how targets are normalized.
    pub routing: RoutingConfig,

    /// Outbound scrape behavior.
    pub scrape: ScrapeConfig,

    /// Caller-facing error mapping.
    pub errors: ErrorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address. `:8444` binds all interfaces.
    pub bind_address: String,

    /// Seconds to wait for in-flight relays after a shutdown signal.
    pub drain_secs: u64,
}

impl ListenerConfig {
    /// Parse the bind address, expanding the host-less `:port` form.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        match self.bind_address.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}").parse(),
            None => self.bind_address.parse(),
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: ":8444".to_string(),
            drain_secs: 5,
        }
    }
}

/// How inbound paths map onto the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMode {
    /// Every GET path is relayed.
    #[default]
    Wildcard,
    /// Only the configured `paths` are relayed (forward-proxy style callers).
    FixedPaths,
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub mode: RouteMode,

    /// Accepted paths in `fixed_paths` mode.
    pub paths: Vec<String>,

    /// Target URL normalization.
    pub normalization: Normalization,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: RouteMode::Wildcard,
            paths: vec![
                "/metrics".to_string(),
                "/api/metrics".to_string(),
                "/proc/metrics".to_string(),
            ],
            normalization: Normalization::Legacy,
        }
    }
}

/// Outbound scrape configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Per-request deadline enforced by the relay, in seconds.
    pub timeout_secs: u64,

    /// Value of the scrape-timeout hint header sent upstream. Advisory only.
    pub timeout_hint_secs: u64,

    pub user_agent: String,

    pub accept: String,

    /// Ceiling on decompressed bytes relayed from a gzip body.
    pub body_limit_bytes: u64,

    /// Apply `body_limit_bytes` to uncompressed bodies too.
    pub limit_plain_bodies: bool,

    /// Ceiling on error body bytes kept for diagnostics. Unbounded when unset.
    pub error_body_limit_bytes: Option<u64>,

    /// Follow upstream redirects (up to 10 hops) instead of relaying the 3xx body.
    pub follow_redirects: bool,

    /// Honor `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` for outbound scrapes.
    pub use_env_proxy: bool,
}

impl ScrapeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            timeout_hint_secs: 10,
            user_agent: "Prometheus/2.7.1".to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            body_limit_bytes: 2 * 1024 * 1024, // 2MiB
            limit_plain_bodies: false,
            error_body_limit_bytes: None,
            follow_redirects: true,
            use_env_proxy: true,
        }
    }
}

/// Caller-facing error mapping.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorConfig {
    /// Leave the status at 200 for transport failures and write the raw
    /// error text, as older deployments did. Off by default (502/504).
    pub legacy_transport_status: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
