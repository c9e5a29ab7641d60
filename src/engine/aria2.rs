//! aria2 adapter speaking its JSON-RPC 2.0 interface over HTTP

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::FetchEngine;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::types::{EngineHandle, FetchPhase, FetchStatus, FileDescriptor, Locator};

/// Fields requested from `aria2.tellStatus`
const STATUS_KEYS: &[&str] = &[
    "gid",
    "status",
    "totalLength",
    "completedLength",
    "downloadSpeed",
    "errorMessage",
    "followedBy",
    "bittorrent",
    "seeder",
];

/// Path prefix aria2 uses for the pseudo-file of a magnet metadata transfer
const METADATA_PREFIX: &str = "[METADATA]";

/// [`FetchEngine`] backed by an aria2 daemon (`aria2c --enable-rpc`)
pub struct Aria2Engine {
    client: reqwest::Client,
    rpc_url: String,
    secret: Option<String>,
    next_request_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatus {
    status: String,
    #[serde(default)]
    total_length: String,
    #[serde(default)]
    completed_length: String,
    #[serde(default)]
    download_speed: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    followed_by: Vec<String>,
    #[serde(default)]
    bittorrent: Option<RawBittorrent>,
    #[serde(default)]
    seeder: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBittorrent {
    #[serde(default)]
    info: Option<RawInfo>,
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFile {
    path: String,
    length: String,
    #[serde(default)]
    selected: Option<String>,
}

impl Aria2Engine {
    /// Build an adapter for the daemon described by `config`
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EngineError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            rpc_url: config.rpc_url.clone(),
            secret: config.secret.clone(),
            next_request_id: AtomicU64::new(1),
        })
    }

    /// Ask the daemon for its version, useful as a connectivity check
    pub async fn version(&self) -> Result<String, EngineError> {
        #[derive(Deserialize)]
        struct Version {
            version: String,
        }

        let version: Version = self.call("aria2.getVersion", Vec::new()).await?;
        Ok(version.version)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, EngineError> {
        let mut full_params = Vec::with_capacity(params.len() + 1);
        if let Some(secret) = &self.secret {
            full_params.push(Value::String(format!("token:{secret}")));
        }
        full_params.extend(params);

        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id.to_string(),
            "method": method,
            "params": full_params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Unreachable(e.to_string()))?;

        // aria2 reports RPC errors with a non-2xx status and a JSON body, so
        // the body is decoded regardless of the status code
        let http_status = response.status();
        let decoded: RpcResponse<T> = response.json().await.map_err(|e| {
            EngineError::InvalidResponse(format!("{method} returned HTTP {http_status}: {e}"))
        })?;

        if let Some(error) = decoded.error {
            return Err(EngineError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        decoded
            .result
            .ok_or_else(|| EngineError::InvalidResponse(format!("{method} returned no result")))
    }
}

#[async_trait]
impl FetchEngine for Aria2Engine {
    async fn submit(&self, locator: &Locator, dir: &Path) -> Result<EngineHandle, EngineError> {
        let options = json!({ "dir": dir.to_string_lossy() });

        let gid: String = match locator {
            Locator::Magnet(uri) | Locator::Url(uri) => {
                self.call("aria2.addUri", vec![json!([uri]), options]).await?
            }
            Locator::TorrentFile(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| EngineError::Io {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                self.call("aria2.addTorrent", vec![json!(encoded), json!([]), options])
                    .await?
            }
        };

        tracing::debug!(gid = %gid, locator = %locator, "Submitted to aria2");
        Ok(EngineHandle::new(gid))
    }

    async fn poll(&self, handle: &EngineHandle) -> Result<FetchStatus, EngineError> {
        let raw: RawStatus = self
            .call("aria2.tellStatus", vec![json!(handle.as_str()), json!(STATUS_KEYS)])
            .await?;
        convert_status(raw)
    }

    async fn list_files(&self, handle: &EngineHandle) -> Result<Vec<FileDescriptor>, EngineError> {
        let raw: Vec<RawFile> = self
            .call("aria2.getFiles", vec![json!(handle.as_str())])
            .await?;

        let mut files = Vec::with_capacity(raw.len());
        for file in raw {
            if file.path.is_empty() || file.path.starts_with(METADATA_PREFIX) {
                continue;
            }
            if file.selected.as_deref() == Some("false") {
                continue;
            }
            files.push(FileDescriptor {
                path: PathBuf::from(file.path),
                size_bytes: parse_count("length", &file.length)?,
            });
        }
        Ok(files)
    }

    async fn cancel(&self, handle: &EngineHandle) -> Result<(), EngineError> {
        // forceRemove fails for transfers that already stopped; the result
        // still has to be purged, so an RPC error here is not final
        match self
            .call::<String>("aria2.forceRemove", vec![json!(handle.as_str())])
            .await
        {
            Ok(_) => {}
            Err(EngineError::Rpc { message, .. }) => {
                tracing::debug!(gid = %handle, error = %message, "forceRemove rejected");
            }
            Err(e) => return Err(e),
        }

        match self
            .call::<String>("aria2.removeDownloadResult", vec![json!(handle.as_str())])
            .await
        {
            Ok(_) => Ok(()),
            Err(EngineError::Rpc { message, .. }) => {
                tracing::debug!(gid = %handle, error = %message, "removeDownloadResult rejected");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "aria2"
    }
}

fn convert_status(raw: RawStatus) -> Result<FetchStatus, EngineError> {
    let awaiting_metadata = raw
        .bittorrent
        .as_ref()
        .is_some_and(|bt| bt.info.as_ref().and_then(|i| i.name.as_ref()).is_none());

    // A torrent that finished downloading keeps reporting "active" while it seeds
    let seeding = raw.seeder.as_deref() == Some("true");

    let phase = match raw.status.as_str() {
        "active" | "waiting" | "paused" if awaiting_metadata => FetchPhase::Metadata,
        "active" if seeding => FetchPhase::Complete,
        "active" | "waiting" | "paused" => FetchPhase::Active,
        "complete" => FetchPhase::Complete,
        "error" => FetchPhase::Error,
        "removed" => FetchPhase::Removed,
        other => {
            return Err(EngineError::InvalidResponse(format!(
                "unknown aria2 status '{other}'"
            )));
        }
    };

    let handoff_handle = if phase == FetchPhase::Complete {
        raw.followed_by.into_iter().next().map(EngineHandle::new)
    } else {
        None
    };

    let error_detail = if phase == FetchPhase::Error {
        Some(
            raw.error_message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "aria2 reported an error without a message".to_string()),
        )
    } else {
        None
    };

    Ok(FetchStatus {
        phase,
        completed_bytes: parse_count("completedLength", &raw.completed_length)?,
        total_bytes: parse_count("totalLength", &raw.total_length)?,
        rate_bytes_per_sec: parse_count("downloadSpeed", &raw.download_speed)?,
        error_detail,
        handoff_handle,
    })
}

/// aria2 sends every number as a decimal string
fn parse_count(field: &str, value: &str) -> Result<u64, EngineError> {
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse()
        .map_err(|_| EngineError::InvalidResponse(format!("{field} is not a number: '{value}'")))
}
