//! Metrics scrape forwarding proxy library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod scrape;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use scrape::{RelayError, ScrapeContext, ScrapeTarget, Scraper};
