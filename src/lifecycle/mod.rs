//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger
//!     second signal  → immediate exit
//!
//! Shutdown (shutdown.rs):
//!     Triggered → listener stops accepting → bounded drain → abort in-flight scrapes
//! ```
//!
//! # Design Decisions
//! - One shared `Shutdown` handle, cloned into the serve loop and the signal task
//! - Shutdown has a deadline: in-flight scrapes are cancelled once it passes

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
