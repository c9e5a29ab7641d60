//! # fetch-relay
//!
//! Job orchestration between a download engine and a chat platform.
//!
//! A user submits a magnet link, a URL or a local torrent file. The relay hands
//! it to a fetch engine (aria2 over JSON-RPC), follows the transfer through
//! metadata resolution, picks the file worth delivering, splits it when it is
//! larger than the platform's upload limit and sends it to the requesting chat
//! (Telegram Bot API). Each job reports into a single status message that is
//! edited in place at a throttled rate.
//!
//! ## Design
//!
//! - **One task per job** - every job is a state machine owned by its own task
//! - **Adapters behind traits** - [`FetchEngine`] and [`Transport`] are the only seams
//! - **Always clean up** - every terminal path stops the engine transfer and
//!   removes the job's local files
//! - **Event-driven** - consumers subscribe to [`Event`]s instead of polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use fetch_relay::{Aria2Engine, ChatRef, Config, Relay, TelegramTransport, UserRef};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.transport.bot_token = "123:abc".to_string();
//!
//!     let engine = Arc::new(Aria2Engine::new(&config.engine)?);
//!     let transport = Arc::new(TelegramTransport::new(&config.transport)?);
//!     let relay = Relay::new(config, engine, transport).await?;
//!
//!     let mut events = relay.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     relay
//!         .submit_job("magnet:?xt=urn:btih:abc", ChatRef(-1001), UserRef(42))
//!         .await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Fetch engine adapters
pub mod engine;
/// Error types
pub mod error;
/// Human-readable status text
pub mod format;
/// Payload selection and splitting
pub mod payload;
/// Job orchestration (decomposed into focused submodules)
pub mod relay;
/// Retry logic with exponential backoff and rate-limit handling
pub mod retry;
/// Per-job progress edit throttling
pub mod throttle;
/// Messaging transport adapters
pub mod transport;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{AdmissionConfig, Config, EngineConfig, RelayConfig, RetryConfig, TransportConfig};
pub use engine::{Aria2Engine, FetchEngine};
pub use error::{EngineError, Error, JobError, Result, TransportError};
pub use payload::SelectionPolicy;
pub use relay::Relay;
pub use transport::{MediaKind, OutgoingFile, ProgressSink, TelegramTransport, Transport};
pub use types::{
    ChatRef, EngineHandle, Event, FetchPhase, FetchStatus, FileDescriptor, JobId, JobState,
    JobSummary, Locator, MessageRef, UserRef,
};

/// Helper function to run the relay with graceful signal handling.
///
/// Waits for a termination signal and then calls the relay's `shutdown()` method,
/// which cancels every running job and waits for them to clean up.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use fetch_relay::{Aria2Engine, Config, Relay, TelegramTransport, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let engine = Arc::new(Aria2Engine::new(&config.engine)?);
///     let transport = Arc::new(TelegramTransport::new(&config.transport)?);
///     let relay = Relay::new(config, engine, transport).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(relay).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(relay: Relay) -> Result<()> {
    let config = relay.get_config();
    tracing::info!(
        storage_dir = %config.storage_dir().display(),
        shutdown_timeout_secs = config.relay.shutdown_timeout.as_secs(),
        "Relay running, waiting for shutdown signal"
    );
    wait_for_signal().await;
    relay.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
