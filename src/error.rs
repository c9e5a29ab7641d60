//! Error types for fetch-relay
//!
//! This module provides the error handling for the library, including:
//! - The crate-level [`Error`] returned by the front-end operations
//! - [`EngineError`] for fetch engine adapters and [`TransportError`] for messaging adapters
//! - [`JobError`], the terminal outcome taxonomy of a single job

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for fetch-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fetch-relay
///
/// This is the primary error type used by the front-end surface of the library.
/// Failures that happen inside a running job never surface here; they end the
/// job with a [`JobError`] that is rendered into its status message.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "poll_interval")
        key: Option<String>,
    },

    /// The submitted source reference is not a magnet, URL or torrent file
    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    /// The requesting user failed the admission check
    #[error("user {0} is not allowed to submit jobs")]
    Unauthorized(i64),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Job not found in the registry
    #[error("job not found: {0}")]
    NotFound(String),

    /// Fetch engine error
    #[error("fetch engine error: {0}")]
    Engine(#[from] EngineError),

    /// Messaging transport error
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Terminal job failure
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors reported by a [`FetchEngine`](crate::engine::FetchEngine) adapter
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine could not be reached (connection refused, timeout, ...)
    #[error("fetch engine unreachable: {0}")]
    Unreachable(String),

    /// The engine answered the call with an error
    #[error("fetch engine rejected {method}: [{code}] {message}")]
    Rpc {
        /// The RPC method that was called
        method: String,
        /// Engine error code
        code: i64,
        /// Engine error message
        message: String,
    },

    /// The engine answered with something we could not interpret
    #[error("invalid fetch engine response: {0}")]
    InvalidResponse(String),

    /// Local I/O needed to talk to the engine failed (e.g. reading a torrent file)
    #[error("failed to read {path}: {reason}")]
    Io {
        /// The file that could not be read
        path: PathBuf,
        /// The underlying reason
        reason: String,
    },
}

/// Errors reported by a [`Transport`](crate::transport::Transport) adapter
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The platform asked us to back off for the given duration
    ///
    /// This is a mandatory backoff-and-retry signal rather than a failure.
    #[error("rate limited, retry after {}s", .0.as_secs())]
    RateLimited(Duration),

    /// The platform could not be reached (connection reset, timeout, ...)
    #[error("network failure: {0}")]
    Network(String),

    /// The platform refused the request
    #[error("request rejected [{code}]: {description}")]
    Rejected {
        /// Platform error code (HTTP-like)
        code: i64,
        /// Platform error description
        description: String,
    },

    /// The platform answered with something we could not interpret
    #[error("invalid transport response: {0}")]
    InvalidResponse(String),

    /// Local I/O needed for the request failed (e.g. opening the file to upload)
    #[error("failed to read {path}: {reason}")]
    Io {
        /// The file that could not be read
        path: PathBuf,
        /// The underlying reason
        reason: String,
    },
}

/// Terminal outcome of a job that did not end in `DONE`
///
/// Every variant is rendered into the job's status message as the final edit,
/// so the `Display` text is written for the person who requested the job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The fetch engine reported an error phase
    #[error("download failed: {0}")]
    FetchFailed(String),

    /// The fetch engine stayed unreachable after bounded retries
    #[error("fetch engine unreachable: {0}")]
    EngineUnreachable(String),

    /// A completed fetch yielded no usable file
    #[error("no deliverable file found after download")]
    NoDeliverablePayload,

    /// No progress was observed within the stall ceiling
    #[error("download stalled: no progress for {}s", .0.as_secs())]
    StallTimeout(Duration),

    /// Delivery failed for a reason other than rate limiting
    #[error("upload failed: {0}")]
    TransportError(String),

    /// Local storage operation failed (splitting, directory setup)
    #[error("storage error: {0}")]
    Storage(String),

    /// The requester cancelled the job
    #[error("cancelled by user")]
    CancelledByUser,
}

impl JobError {
    /// Whether this outcome counts as a failure (cancellation does not)
    pub fn is_failure(&self) -> bool {
        !matches!(self, JobError::CancelledByUser)
    }

    /// Machine-readable code for logs and events
    pub fn code(&self) -> &'static str {
        match self {
            JobError::FetchFailed(_) => "fetch_failed",
            JobError::EngineUnreachable(_) => "engine_unreachable",
            JobError::NoDeliverablePayload => "no_deliverable_payload",
            JobError::StallTimeout(_) => "stall_timeout",
            JobError::TransportError(_) => "transport_error",
            JobError::Storage(_) => "storage_error",
            JobError::CancelledByUser => "cancelled",
        }
    }
}

impl From<TransportError> for JobError {
    fn from(error: TransportError) -> Self {
        JobError::TransportError(error.to_string())
    }
}

impl From<EngineError> for JobError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Unreachable(msg) => JobError::EngineUnreachable(msg),
            other => JobError::FetchFailed(other.to_string()),
        }
    }
}
