//! Scrape subsystem: the request-scrape-respond core.
//!
//! # Data Flow
//! ```text
//! Raw request URI
//!     → target.rs (empty check, normalization → ScrapeTarget)
//!     → context.rs (per-request deadline + cancellation)
//!     → scraper.rs (GET with negotiation headers, classify status)
//!     → body.rs (optional gzip decode, byte ceiling, deadline-aware reads)
//!     → ScrapeSession streamed into the caller's sink
//! ```
//!
//! # Design Decisions
//! - Status is fully classified before any body byte is handed out
//! - The context is the only cancellation mechanism; the client has no timeout
//! - Nothing is shared across requests except the read-only HTTP client

pub mod body;
pub mod context;
pub mod error;
pub mod scraper;
pub mod target;

pub use context::ScrapeContext;
pub use error::{RelayError, ScrapeError, TransportError};
pub use scraper::{BodyEncoding, ScrapeSession, Scraper};
pub use target::{resolve, Normalization, ScrapeTarget};
