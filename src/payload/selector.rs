//! Choosing the deliverable file of a completed fetch

use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::types::FileDescriptor;

/// How a multi-file result is reduced to a single deliverable
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// The largest file wins; ties go to the first one listed
    #[default]
    LargestFile,
    /// The first listed file wins
    FirstFile,
}

/// Pick the file to deliver
///
/// Files the engine listed but that are missing from local storage are
/// skipped. Fails with [`JobError::NoDeliverablePayload`] when nothing is left.
pub async fn select_payload(
    files: &[FileDescriptor],
    policy: SelectionPolicy,
) -> Result<FileDescriptor, JobError> {
    let mut present = Vec::with_capacity(files.len());
    for file in files {
        match tokio::fs::try_exists(&file.path).await {
            Ok(true) => present.push(file),
            Ok(false) => {
                tracing::warn!(path = %file.path.display(), "Listed file is missing on disk");
            }
            Err(e) => {
                tracing::warn!(
                    path = %file.path.display(),
                    error = %e,
                    "Could not stat listed file"
                );
            }
        }
    }

    let chosen = match policy {
        SelectionPolicy::FirstFile => present.first().copied(),
        // max_by_key keeps the last maximum, so fold to keep the first
        SelectionPolicy::LargestFile => {
            present
                .iter()
                .copied()
                .fold(None::<&FileDescriptor>, |best, file| match best {
                    Some(b) if b.size_bytes >= file.size_bytes => Some(b),
                    _ => Some(file),
                })
        }
    };

    chosen.cloned().ok_or(JobError::NoDeliverablePayload)
}
