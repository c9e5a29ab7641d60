//! Byte-offset splitting of oversized payloads
//!
//! Parts are plain slices of the source file named `<file>.001`, `<file>.002`
//! and so on; concatenating them in order reproduces the source exactly.
//! [`PayloadSplitter`] cuts one part at a time so only the part being sent
//! needs to exist next to the source.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufWriter};

use crate::error::JobError;

/// One cut part on local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFile {
    /// 1-based position
    pub index: usize,
    /// Number of parts the source is cut into
    pub total: usize,
    /// Where the part was written
    pub path: PathBuf,
    /// Bytes in this part
    pub size_bytes: u64,
}

/// Lazily cuts a file into parts no larger than `part_limit`
#[derive(Debug)]
pub struct PayloadSplitter {
    source: PathBuf,
    out_dir: PathBuf,
    file_name: String,
    source_size: u64,
    part_limit: u64,
    total: usize,
    next_index: usize,
}

impl PayloadSplitter {
    /// Prepare to split `source` into `out_dir`
    ///
    /// `part_limit` must be non-zero.
    pub async fn new(source: &Path, part_limit: u64, out_dir: &Path) -> Result<Self, JobError> {
        if part_limit == 0 {
            return Err(JobError::Storage("part size limit must be non-zero".to_string()));
        }
        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(|e| storage_error("stat", source, &e))?;
        let source_size = metadata.len();
        let total = source_size.div_ceil(part_limit).max(1) as usize;
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "payload".to_string());

        Ok(Self {
            source: source.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
            file_name,
            source_size,
            part_limit,
            total,
            next_index: 1,
        })
    }

    /// Number of parts the source is cut into
    pub fn part_count(&self) -> usize {
        self.total
    }

    /// Size of the source file
    pub fn source_size(&self) -> u64 {
        self.source_size
    }

    /// Cut the next part, or return `None` once every part has been cut
    pub async fn next_part(&mut self) -> Result<Option<PartFile>, JobError> {
        if self.next_index > self.total {
            return Ok(None);
        }
        let index = self.next_index;
        let offset = (index as u64 - 1) * self.part_limit;
        let length = self.part_limit.min(self.source_size - offset);
        let path = self
            .out_dir
            .join(format!("{}.{:03}", self.file_name, index));

        let mut input = tokio::fs::File::open(&self.source)
            .await
            .map_err(|e| storage_error("open", &self.source, &e))?;
        input
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| storage_error("seek", &self.source, &e))?;

        let output = tokio::fs::File::create(&path)
            .await
            .map_err(|e| storage_error("create", &path, &e))?;
        let mut writer = BufWriter::new(output);
        let copied = tokio::io::copy(&mut input.take(length), &mut writer)
            .await
            .map_err(|e| storage_error("write", &path, &e))?;
        writer
            .flush()
            .await
            .map_err(|e| storage_error("flush", &path, &e))?;

        if copied != length {
            return Err(JobError::Storage(format!(
                "short read while cutting {}: expected {length} bytes, got {copied}",
                path.display()
            )));
        }

        self.next_index += 1;
        tracing::debug!(
            part = index,
            total = self.total,
            size_bytes = length,
            path = %path.display(),
            "Cut part"
        );

        Ok(Some(PartFile {
            index,
            total: self.total,
            path,
            size_bytes: length,
        }))
    }
}

/// Cut `source` into every part at once
///
/// The source file is left in place.
pub async fn split_file(
    source: &Path,
    part_limit: u64,
    out_dir: &Path,
) -> Result<Vec<PartFile>, JobError> {
    let mut splitter = PayloadSplitter::new(source, part_limit, out_dir).await?;
    let mut parts = Vec::with_capacity(splitter.part_count());
    while let Some(part) = splitter.next_part().await? {
        parts.push(part);
    }
    Ok(parts)
}

fn storage_error(action: &str, path: &Path, err: &std::io::Error) -> JobError {
    JobError::Storage(format!("failed to {action} {}: {err}", path.display()))
}
