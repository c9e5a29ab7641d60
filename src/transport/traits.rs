//! The transport trait and the outgoing file description

use async_trait::async_trait;
use std::path::PathBuf;

use super::{MediaKind, ProgressSink};
use crate::error::TransportError;
use crate::types::{ChatRef, MessageRef};

/// A file about to be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    /// Local path to read from
    pub path: PathBuf,
    /// Name shown to the recipient
    pub file_name: String,
    /// Optional caption attached to the upload
    pub caption: Option<String>,
    /// Which upload call to use
    pub kind: MediaKind,
    /// Size in bytes, used for the upload length and progress totals
    pub size_bytes: u64,
}

impl OutgoingFile {
    /// Describe `path`, deriving the display name and media kind from it
    pub fn new(path: PathBuf, size_bytes: u64) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let kind = MediaKind::from_path(&path);
        Self {
            path,
            file_name,
            caption: None,
            kind,
            size_bytes,
        }
    }

    /// Attach a caption
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// A chat platform that can carry status messages and file uploads
#[async_trait]
pub trait Transport: Send + Sync {
    /// Post a new text message
    async fn send_message(&self, chat: ChatRef, text: &str) -> Result<MessageRef, TransportError>;

    /// Replace the text of an existing message
    ///
    /// Editing a message to the text it already has counts as success.
    async fn edit_message(&self, message: &MessageRef, text: &str) -> Result<(), TransportError>;

    /// Delete a message
    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError>;

    /// Upload a file, reporting bytes sent through `progress`
    ///
    /// Each call re-reads the file from the start, so the same call may be
    /// repeated after a rate-limit signal.
    async fn send_file(
        &self,
        chat: ChatRef,
        file: &OutgoingFile,
        progress: ProgressSink,
    ) -> Result<MessageRef, TransportError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
