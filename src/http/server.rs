//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router for the configured route mode
//! - Wire up middleware (request ID, tracing)
//! - Serve until shutdown, then drain with a deadline
//! - Cancel in-flight scrapes when the drain deadline passes

use std::future::IntoFuture;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ErrorConfig, ProxyConfig, RouteMode};
use crate::http::relay::relay_handler;
use crate::lifecycle::Shutdown;
use crate::scrape::{Normalization, Scraper, TransportError};

/// How long cancelled relays get to unwind before the server gives up on them.
const ABORT_GRACE: Duration = Duration::from_secs(1);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub scraper: Scraper,
    pub normalization: Normalization,
    pub errors: ErrorConfig,
    /// Deadline applied to every scrape, measured from request arrival.
    pub scrape_timeout: Duration,
    /// Parent of every per-request scrape context.
    pub inflight: CancellationToken,
}

/// HTTP server for the scrape proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    inflight: CancellationToken,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, TransportError> {
        let scraper = Scraper::new(config.scrape.clone())?;
        let inflight = CancellationToken::new();

        let state = AppState {
            scraper,
            normalization: config.routing.normalization,
            errors: config.errors.clone(),
            scrape_timeout: config.scrape.timeout(),
            inflight: inflight.clone(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            inflight,
        })
    }

    /// Build the axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let relay = get(relay_handler);

        let routes = match config.routing.mode {
            RouteMode::Wildcard => Router::new()
                .route("/", relay.clone())
                .route("/{*target}", relay),
            RouteMode::FixedPaths => config
                .routing
                .paths
                .iter()
                .fold(Router::new(), |router, path| router.route(path, relay.clone())),
        };

        routes.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires and in-flight relays drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            route_mode = ?self.config.routing.mode,
            normalization = ?self.config.routing.normalization,
            "HTTP server starting"
        );

        let drain = self.config.listener.drain_timeout();
        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.wait_owned())
            .into_future();
        tokio::pin!(serve);

        let drain_deadline = async {
            shutdown.wait().await;
            tracing::info!(drain_secs = drain.as_secs(), "Draining in-flight relays");
            tokio::time::sleep(drain).await;
        };

        tokio::select! {
            result = &mut serve => result?,
            _ = drain_deadline => {
                tracing::warn!("Drain deadline passed, cancelling in-flight scrapes");
                self.inflight.cancel();
                match tokio::time::timeout(ABORT_GRACE, &mut serve).await {
                    Ok(result) => result?,
                    Err(_) => tracing::warn!("Relays still open after cancellation, exiting anyway"),
                }
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
