//! Configuration types for fetch-relay

use crate::error::{Error, Result};
use crate::payload::SelectionPolicy;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Job pipeline behavior (storage, concurrency, polling cadence, throttling)
///
/// Groups settings related to how jobs are fetched, tracked and cleaned up.
/// Used as a flattened sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Root for per-job storage directories (default: "./downloads")
    ///
    /// Each job writes into `<storage_dir>/job_<id>`, which is deleted on every
    /// terminal path.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Maximum number of jobs fetching at the same time (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_fetches: usize,

    /// Interval between fetch engine polls (default: 2 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Minimum spacing between progress edits of one status message (default: 4 seconds)
    #[serde(default = "default_progress_interval", with = "duration_serde")]
    pub progress_interval: Duration,

    /// How long a fetch may go without any observable change before it is
    /// treated as stalled (default: 30 minutes)
    #[serde(default = "default_stall_timeout", with = "duration_serde")]
    pub stall_timeout: Duration,

    /// Upper bound on waiting for the engine to acknowledge a cancel (default: 10 seconds)
    #[serde(default = "default_cancel_wait", with = "duration_serde")]
    pub cancel_wait: Duration,

    /// Longest rate-limit backoff honored before giving up on a send (default: 10 minutes)
    #[serde(default = "default_max_rate_limit_wait", with = "duration_serde")]
    pub max_rate_limit_wait: Duration,

    /// How long shutdown waits for running jobs to tear down (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Which file of a multi-file result is delivered (default: largest file)
    #[serde(default)]
    pub selection: SelectionPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            max_concurrent_fetches: default_max_concurrent(),
            poll_interval: default_poll_interval(),
            progress_interval: default_progress_interval(),
            stall_timeout: default_stall_timeout(),
            cancel_wait: default_cancel_wait(),
            max_rate_limit_wait: default_max_rate_limit_wait(),
            shutdown_timeout: default_shutdown_timeout(),
            selection: SelectionPolicy::default(),
        }
    }
}

/// Fetch engine connection settings (aria2 JSON-RPC)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// JSON-RPC endpoint (default: "http://localhost:6800/jsonrpc")
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// RPC secret token, sent as `token:<secret>` (None = no secret)
    #[serde(default)]
    pub secret: Option<String>,

    /// Timeout for a single RPC call (default: 10 seconds)
    #[serde(default = "default_engine_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            secret: None,
            request_timeout: default_engine_timeout(),
        }
    }
}

/// Messaging transport settings (Telegram Bot API)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Bot API base URL (default: "https://api.telegram.org")
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bot token
    #[serde(default)]
    pub bot_token: String,

    /// Largest single file the platform accepts; larger payloads are split
    /// (default: 50 MiB, the Bot API upload ceiling)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Timeout for text requests (default: 30 seconds)
    #[serde(default = "default_transport_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for a single file upload (default: 1 hour)
    #[serde(default = "default_upload_timeout", with = "duration_serde")]
    pub upload_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            bot_token: String::new(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout: default_transport_timeout(),
            upload_timeout: default_upload_timeout(),
        }
    }
}

/// Admission check applied to every submitted job
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// User ids allowed to submit jobs (empty = everyone)
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

impl AdmissionConfig {
    /// Whether the given user passes the admission check
    pub fn admits(&self, user: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user)
    }
}

/// Main configuration for [`Relay`](crate::Relay)
///
/// Fields are organized into logical sub-configs:
/// - [`relay`](RelayConfig): storage, concurrency, polling, throttling (flattened)
/// - [`engine`](EngineConfig): fetch engine endpoint
/// - [`transport`](TransportConfig): messaging platform endpoint and limits
/// - [`retry`](RetryConfig): bounded retry of transient hiccups
/// - [`admission`](AdmissionConfig): who may submit jobs
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Job pipeline settings
    #[serde(flatten)]
    pub relay: RelayConfig,

    /// Fetch engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Messaging transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Retry policy for transient engine and transport failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Admission check
    #[serde(default)]
    pub admission: AdmissionConfig,
}

impl Config {
    /// Storage root for per-job directories
    pub fn storage_dir(&self) -> &PathBuf {
        &self.relay.storage_dir
    }

    /// Check settings that would make the pipeline misbehave
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.relay.max_concurrent_fetches == 0 {
            return Err(config_error(
                "max_concurrent_fetches",
                "must allow at least one concurrent fetch",
            ));
        }
        if self.relay.poll_interval.is_zero() {
            return Err(config_error("poll_interval", "must be greater than zero"));
        }
        if self.relay.progress_interval < Duration::from_secs(1) {
            return Err(config_error(
                "progress_interval",
                "must be at least one second to respect transport rate limits",
            ));
        }
        if self.relay.stall_timeout <= self.relay.poll_interval {
            return Err(config_error(
                "stall_timeout",
                "must be longer than poll_interval",
            ));
        }
        if self.transport.max_upload_bytes == 0 {
            return Err(config_error("max_upload_bytes", "must be greater than zero"));
        }
        Ok(())
    }
}

fn config_error(key: &str, message: &str) -> Error {
    Error::Config {
        message: format!("{key} {message}"),
        key: Some(key.to_string()),
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_progress_interval() -> Duration {
    Duration::from_secs(4)
}

fn default_stall_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_cancel_wait() -> Duration {
    Duration::from_secs(10)
}

fn default_max_rate_limit_wait() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_rpc_url() -> String {
    "http://localhost:6800/jsonrpc".to_string()
}

fn default_engine_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_transport_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
