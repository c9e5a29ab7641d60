//! Core relay implementation split into focused submodules.
//!
//! The `Relay` struct and its methods are organized by domain:
//! - [`control`] - Job admission, cancellation and listing
//! - [`lifecycle`] - Shutdown coordination
//! - [`registry`] - Process-wide map of running jobs
//! - [`job_task`] - The per-job state machine (fetch, select, split, deliver, clean up)

mod control;
mod job_task;
mod lifecycle;
mod registry;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64};

use crate::config::Config;
use crate::engine::FetchEngine;
use crate::error::Result;
use crate::transport::Transport;
use crate::types::Event;

pub(crate) use registry::JobRegistry;

/// Buffered events per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 1000;

/// Main relay instance (cloneable - all fields are Arc-wrapped)
///
/// Owns the shared pieces every job task needs: the fetch engine, the
/// transport, the job registry and the admission gate that bounds how many
/// jobs fetch at the same time.
#[derive(Clone)]
pub struct Relay {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Fetch engine adapter shared by every job
    pub(crate) engine: Arc<dyn FetchEngine>,
    /// Messaging transport adapter shared by every job
    pub(crate) transport: Arc<dyn Transport>,
    /// Running jobs and their cancellation tokens
    pub(crate) registry: JobRegistry,
    /// Admission gate in front of the fetch phase (respects max_concurrent_fetches)
    pub(crate) fetch_gate: Arc<tokio::sync::Semaphore>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Flag to indicate whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Next job id to hand out
    pub(crate) next_id: Arc<AtomicI64>,
}

impl Relay {
    /// Create a new Relay
    ///
    /// Validates the configuration and creates the storage root. No job runs
    /// until [`submit_job`](Self::submit_job) is called.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fetch_relay::{Aria2Engine, Config, Relay, TelegramTransport};
    /// use std::sync::Arc;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut config = Config::default();
    /// config.transport.bot_token = "123456:token".to_string();
    ///
    /// let engine = Arc::new(Aria2Engine::new(&config.engine)?);
    /// let transport = Arc::new(TelegramTransport::new(&config.transport)?);
    /// let relay = Relay::new(config, engine, transport).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(
        config: Config,
        engine: Arc<dyn FetchEngine>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(config.storage_dir())
            .await
            .map_err(|e| {
                crate::error::Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create storage directory '{}': {}",
                        config.storage_dir().display(),
                        e
                    ),
                ))
            })?;

        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CAPACITY);
        let fetch_gate = Arc::new(tokio::sync::Semaphore::new(
            config.relay.max_concurrent_fetches,
        ));

        tracing::info!(
            engine = engine.name(),
            transport = transport.name(),
            max_concurrent_fetches = config.relay.max_concurrent_fetches,
            storage_dir = %config.storage_dir().display(),
            "Relay initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            engine,
            transport,
            registry: JobRegistry::new(),
            fetch_gate,
            event_tx,
            accepting_new: Arc::new(AtomicBool::new(true)),
            next_id: Arc::new(AtomicI64::new(1)),
        })
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use fetch_relay::Relay;
    /// # async fn example(relay: Relay) {
    /// let mut events = relay.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "job event");
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
