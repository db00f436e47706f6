//! Metrics scrape forwarding proxy.
//!
//! Callers address an upstream metrics endpoint through the proxy, either as
//! an HTTP forward proxy (`GET http://10.0.0.5:9100/metrics`) or with the
//! target embedded in the path (`GET /http://10.0.0.5:9100/metrics`). The
//! proxy scrapes the target under a hard deadline and streams the body back.
//!
//! ```text
//!     Caller ──▶ listener ──▶ relay ──▶ resolve target ──▶ scraper ──▶ Upstream
//!            ◀── 200 stream / plaintext error ◀── gzip decode + 2MiB cap ◀──
//! ```

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use scrape_proxy::config::build_config;
use scrape_proxy::http::HttpServer;
use scrape_proxy::lifecycle::{signals, Shutdown};
use scrape_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "scrape-proxy")]
#[command(about = "Forwarding proxy for Prometheus metrics scrapes", long_about = None)]
struct Cli {
    /// HTTP listen address [default: :8444]; `-addr` is also accepted
    #[arg(long)]
    addr: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_from(legacy_args(std::env::args_os()));
    let config = build_config(cli.config.as_deref(), cli.addr)?;

    logging::init_logging(&config.observability);
    tracing::info!("scrape-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        scrape_timeout_secs = config.scrape.timeout_secs,
        body_limit_bytes = config.scrape.body_limit_bytes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(config.listener.socket_addr()?).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Rewrite the single-dash `-addr` spelling used by existing deployments
/// into `--addr`. Option values are passed through untouched.
fn legacy_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut expects_value = false;
    args.into_iter()
        .map(|arg| {
            let arg = if expects_value { arg } else { legacy_flag(arg) };
            expects_value = matches!(arg.to_str(), Some("--addr" | "-c" | "--config"));
            arg
        })
        .collect()
}

fn legacy_flag(arg: OsString) -> OsString {
    match arg.to_str() {
        Some("-addr") => "--addr".into(),
        Some(value) => match value.strip_prefix("-addr=") {
            Some(addr) => format!("--addr={addr}").into(),
            None => arg,
        },
        None => arg,
    }
}
