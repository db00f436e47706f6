//! Target resolution.
//!
//! # Responsibilities
//! - Reject an empty raw target
//! - Normalize trailing slash and default-port suffixes
//!
//! # Design Decisions
//! - `Legacy` normalization removes the literal substrings `:80` and `:443`
//!   anywhere in the URL. Deployed scrapers depend on it, so it stays the
//!   default even though it mangles e.g. `?addr=:8080` or `host:8080`.
//! - `Strict` normalization parses the URL and drops only ports that equal
//!   the scheme default.
//! - No syntax validation happens here; a malformed URL fails when the
//!   outbound request is built.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scrape::error::RelayError;

/// How default ports are removed from a target URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Substring removal of `:80` and `:443`.
    #[default]
    Legacy,
    /// URL-aware removal of scheme-default ports only.
    Strict,
}

/// A normalized upstream metrics endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    url: String,
}

impl ScrapeTarget {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Derive the scrape target from the raw request URI.
pub fn resolve(raw: &str, normalization: Normalization) -> Result<ScrapeTarget, RelayError> {
    if raw.is_empty() {
        return Err(RelayError::EmptyTarget);
    }

    let url = match normalization {
        Normalization::Legacy => strip_default_ports(trim_slash(raw)),
        Normalization::Strict => normalize_strict(trim_slash(raw)),
    };

    Ok(ScrapeTarget { url })
}

fn trim_slash(raw: &str) -> &str {
    raw.strip_suffix('/').unwrap_or(raw)
}

fn strip_default_ports(url: &str) -> String {
    url.replace(":80", "").replace(":443", "")
}

fn normalize_strict(url: &str) -> String {
    match url::Url::parse(url) {
        // The url crate already omits a port equal to the scheme default.
        Ok(parsed) => trim_slash(parsed.as_str()).to_string(),
        Err(_) => url.to_string(),
    }
}
