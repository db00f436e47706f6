//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, request ID + trace layers)
//!     → relay.rs (extract raw target, resolve, scrape)
//!     → streamed 200 body, or a plaintext error response
//! ```

pub mod relay;
pub mod server;

pub use relay::{error_response, raw_target, FAILURE_PREFIX};
pub use server::{AppState, HttpServer};
