//! Shutdown coordination for the proxy.

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Coordinator for graceful shutdown.
///
/// Cloning yields another handle to the same signal; any handle can trigger
/// it and every waiter observes it.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the shutdown signal.
    pub async fn wait(&self) {
        self.token.cancelled().await
    }

    /// Owned future resolving on shutdown, for APIs that need `'static`.
    pub fn wait_owned(&self) -> WaitForCancellationFutureOwned {
        self.token.clone().cancelled_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_every_clone() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let owned = shutdown.wait_owned();

        let handle = tokio::spawn(async move { waiter.wait().await });
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), owned).await.unwrap();
        assert!(shutdown.is_triggered());
    }
}
