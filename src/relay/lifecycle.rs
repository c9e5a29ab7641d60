//! Shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;
use crate::types::Event;

use super::Relay;

/// How often shutdown re-checks the registry while draining
const DRAIN_POLL: Duration = Duration::from_millis(100);

impl Relay {
    /// Gracefully shut down the relay
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new jobs
    /// 2. Cancels every running job (each one still cleans up after itself)
    /// 3. Waits for the registry to drain, bounded by `shutdown_timeout`
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Jobs still running when the timeout expires are abandoned; their
    /// storage directories may survive.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        let signalled = self.registry.cancel_all().await;
        tracing::info!(signalled, "Signalled cancellation to running jobs");

        let timeout = self.config.relay.shutdown_timeout;
        match tokio::time::timeout(timeout, self.wait_for_jobs()).await {
            Ok(()) => tracing::info!("All jobs finished cleanup"),
            Err(_) => {
                let remaining = self.registry.len().await;
                tracing::warn!(
                    remaining,
                    timeout_secs = timeout.as_secs(),
                    "Timeout waiting for jobs to finish, proceeding with shutdown"
                );
            }
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Wait until every registered job has left the registry
    async fn wait_for_jobs(&self) {
        loop {
            let active = self.registry.len().await;
            if active == 0 {
                return;
            }
            tracing::debug!(active, "Waiting for jobs to finish");
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }
}
