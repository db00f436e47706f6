//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional) + CLI overrides
//!     → loader.rs (parse & deserialize, apply overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → cloned into the HTTP server and the scraper at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{build_config, load_config, ConfigError};
pub use schema::{
    ErrorConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, RouteMode,
    RoutingConfig, ScrapeConfig, DEFAULT_ACCEPT,
};
pub use validation::{validate_config, ValidationError};
