//! Media category lookup for uploads

use serde::{Deserialize, Serialize};
use std::path::Path;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "m4v", "wmv", "flv", "ts"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "aac", "ogg", "opus", "wav"];

/// How a file is presented by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Streamable video
    Video,
    /// Audio track
    Audio,
    /// Anything else, delivered as a generic document
    Document,
}

impl MediaKind {
    /// Classify a file by its extension, falling back to [`MediaKind::Document`]
    ///
    /// ```
    /// use fetch_relay::transport::MediaKind;
    /// use std::path::Path;
    ///
    /// assert_eq!(MediaKind::from_path(Path::new("song.FLAC")), MediaKind::Audio);
    /// assert_eq!(MediaKind::from_path(Path::new("notes.nfo")), MediaKind::Document);
    /// ```
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return MediaKind::Document;
        };
        let ext = ext.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Audio
        } else {
            MediaKind::Document
        }
    }

    /// Bot API method that uploads this kind
    pub fn api_method(&self) -> &'static str {
        match self {
            MediaKind::Video => "sendVideo",
            MediaKind::Audio => "sendAudio",
            MediaKind::Document => "sendDocument",
        }
    }

    /// Multipart field carrying the file for [`api_method`](Self::api_method)
    pub fn form_field(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        }
    }
}
