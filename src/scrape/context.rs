//! Per-scrape deadline and cancellation.
//!
//! A `ScrapeContext` is created by the caller of the scraper, never by the
//! scraper itself, so the caller owns the cancellation policy.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::scrape::error::TransportError;

/// Deadline plus cancellation handle bound to one scrape.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    deadline: Instant,
    token: CancellationToken,
}

impl ScrapeContext {
    /// Context that expires `timeout` from now and is only cancelled explicitly.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Instant::now() + timeout, CancellationToken::new())
    }

    /// Context that expires `timeout` from now or when `parent` is cancelled.
    pub fn child_of(parent: &CancellationToken, timeout: Duration) -> Self {
        Self::new(Instant::now() + timeout, parent.child_token())
    }

    pub fn new(deadline: Instant, token: CancellationToken) -> Self {
        Self { deadline, token }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the scrape bound to this context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `fut` until it completes, the context is cancelled, or the deadline passes.
    ///
    /// Cancellation wins over an already-expired deadline, and both win over
    /// a future that is ready at the same time.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, TransportError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(TransportError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(TransportError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
