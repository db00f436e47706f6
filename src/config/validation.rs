//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0, addresses parse)
//! - Reject fixed paths the router cannot mount
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::{ProxyConfig, RouteMode};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.socket_addr().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid address '{}'", config.listener.bind_address),
        ));
    }

    if config.scrape.timeout_secs == 0 {
        errors.push(ValidationError::new("scrape.timeout_secs", "must be greater than 0"));
    }
    if config.scrape.body_limit_bytes == 0 {
        errors.push(ValidationError::new("scrape.body_limit_bytes", "must be greater than 0"));
    }
    if config.scrape.user_agent.is_empty() {
        errors.push(ValidationError::new("scrape.user_agent", "must not be empty"));
    }
    if config.scrape.accept.is_empty() {
        errors.push(ValidationError::new("scrape.accept", "must not be empty"));
    }

    if config.routing.mode == RouteMode::FixedPaths {
        if config.routing.paths.is_empty() {
            errors.push(ValidationError::new("routing.paths", "fixed_paths mode needs at least one path"));
        }
        let mut seen = HashSet::new();
        for path in &config.routing.paths {
            if !path.starts_with('/') {
                errors.push(ValidationError::new("routing.paths", format!("'{}' must start with '/'", path)));
            }
            if path.contains(['{', '}', '*']) {
                errors.push(ValidationError::new("routing.paths", format!("'{}' contains route syntax", path)));
            }
            if !seen.insert(path.as_str()) {
                errors.push(ValidationError::new("routing.paths", format!("'{}' is listed twice", path)));
            }
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
