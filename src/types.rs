//! Core types for fetch-relay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Unique identifier for a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Destination chat or channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatRef(pub i64);

/// The user who requested a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(pub i64);

/// A message that was sent to the platform and can be edited or deleted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Chat the message lives in
    pub chat: ChatRef,
    /// Platform message id within that chat
    pub message_id: i64,
}

/// Opaque handle the fetch engine uses for one transfer
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineHandle(pub String);

impl EngineHandle {
    /// Create a handle from anything string-like
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Borrow the raw handle
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A source reference identifying content to fetch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Locator {
    /// Magnet URI; the file manifest must be resolved before content flows
    Magnet(String),
    /// Direct HTTP(S)/FTP URL
    Url(String),
    /// Local `.torrent` file
    TorrentFile(PathBuf),
}

const URL_SCHEMES: &[&str] = &["http", "https", "ftp", "sftp"];

impl Locator {
    /// Classify raw user input into a locator
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocator`] when the input is neither a magnet URI,
    /// a supported URL, nor an existing `.torrent` file.
    ///
    /// # Examples
    ///
    /// ```
    /// use fetch_relay::Locator;
    ///
    /// let magnet = Locator::parse("magnet:?xt=urn:btih:abcdef").unwrap();
    /// assert!(magnet.needs_metadata());
    ///
    /// let url = Locator::parse("  https://example.com/file.iso ").unwrap();
    /// assert_eq!(url.as_display(), "https://example.com/file.iso");
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidLocator("empty input".to_string()));
        }

        if input
            .get(..7)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("magnet:"))
        {
            return Ok(Locator::Magnet(input.to_string()));
        }

        if let Ok(url) = url::Url::parse(input)
            && URL_SCHEMES.contains(&url.scheme())
        {
            return Ok(Locator::Url(input.to_string()));
        }

        let path = Path::new(input);
        let is_torrent = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("torrent"));
        if is_torrent && path.is_file() {
            return Ok(Locator::TorrentFile(path.to_path_buf()));
        }

        Err(Error::InvalidLocator(format!(
            "not a magnet link, URL or torrent file: {input}"
        )))
    }

    /// Whether the engine must resolve metadata before the content transfer
    pub fn needs_metadata(&self) -> bool {
        matches!(self, Locator::Magnet(_))
    }

    /// Locator text for listings and logs
    pub fn as_display(&self) -> String {
        match self {
            Locator::Magnet(uri) | Locator::Url(uri) => uri.clone(),
            Locator::TorrentFile(path) => path.display().to_string(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_display())
    }
}

/// Phase reported by a fetch engine poll
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPhase {
    /// Acquiring the file manifest (magnet metadata)
    Metadata,
    /// Transferring content (includes queued/paused-in-engine)
    Active,
    /// Transfer finished
    Complete,
    /// Engine gave up on the transfer
    Error,
    /// Transfer was removed from the engine
    Removed,
}

/// Snapshot returned by a fetch engine poll
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStatus {
    /// Current phase
    pub phase: FetchPhase,
    /// Bytes transferred so far
    pub completed_bytes: u64,
    /// Total bytes (0 when unknown)
    pub total_bytes: u64,
    /// Current transfer rate
    pub rate_bytes_per_sec: u64,
    /// Engine error text when `phase` is `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// New handle to continue with when a completed phase hands off to a
    /// follow-up transfer (magnet metadata → content)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff_handle: Option<EngineHandle>,
}

impl FetchStatus {
    /// A progress snapshot with no error and no hand-off
    pub fn progress(phase: FetchPhase, completed_bytes: u64, total_bytes: u64, rate: u64) -> Self {
        Self {
            phase,
            completed_bytes,
            total_bytes,
            rate_bytes_per_sec: rate,
            error_detail: None,
            handoff_handle: None,
        }
    }

    /// Percentage complete in [0, 100] (0 when the total is unknown)
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.completed_bytes as f64 / self.total_bytes as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// One file reported by the fetch engine for a completed transfer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Absolute path on local storage
    pub path: PathBuf,
    /// File size in bytes
    pub size_bytes: u64,
}

/// Job state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, waiting for a fetch slot
    Submitted,
    /// Engine is acquiring magnet metadata
    MetadataResolving,
    /// Engine is transferring content
    Fetching,
    /// Engine reported completion
    FetchComplete,
    /// Choosing the file to deliver
    Selecting,
    /// Cutting an oversized file into parts
    Splitting,
    /// Uploading parts to the destination
    Delivering,
    /// Delivered successfully
    Done,
    /// Ended with a failure
    Failed,
    /// Cancelled by the requester
    Cancelled,
}

impl JobState {
    /// Whether the job has reached an end state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Cancelled)
    }

    /// Human-readable name for status listings
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Submitted => "queued",
            JobState::MetadataResolving => "resolving metadata",
            JobState::Fetching => "downloading",
            JobState::FetchComplete => "download complete",
            JobState::Selecting => "selecting file",
            JobState::Splitting => "splitting",
            JobState::Delivering => "uploading",
            JobState::Done => "done",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }
}

/// Listing entry exposed to the front end
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job id
    pub id: JobId,
    /// Source reference as submitted
    pub locator: String,
    /// Current state
    pub state: JobState,
    /// Admission time
    pub created_at: DateTime<Utc>,
    /// Destination chat
    pub destination: ChatRef,
    /// Requesting user
    pub requested_by: UserRef,
}

/// Event emitted during a job's lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job admitted
    Submitted {
        /// Job id
        id: JobId,
        /// Source reference
        locator: String,
    },

    /// Job moved to a new state
    StateChanged {
        /// Job id
        id: JobId,
        /// The state just entered
        state: JobState,
    },

    /// Job reached a terminal state and was removed from the registry
    Finished {
        /// Job id
        id: JobId,
        /// Terminal state
        state: JobState,
        /// Failure reason (None for DONE)
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The relay is shutting down
    Shutdown,
}
