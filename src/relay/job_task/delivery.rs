//! Delivery phase: select the payload, split it if needed, upload the parts in order.

use tokio::time::Instant;

use crate::error::{JobError, TransportError};
use crate::format::ProgressSample;
use crate::payload::{PayloadSplitter, select_payload};
use crate::retry::with_rate_limit;
use crate::transport::{OutgoingFile, ProgressSink};
use crate::types::{FileDescriptor, JobState, MessageRef};

use super::context::{Job, JobContext};

/// What was delivered, for the final status message
pub(super) struct Delivered {
    pub(super) file_name: String,
    pub(super) parts: usize,
    pub(super) size_bytes: u64,
}

/// Pick the deliverable from `files` and upload it, splitting when oversized
pub(super) async fn deliver_payload(
    ctx: &JobContext,
    job: &mut Job,
    files: Vec<FileDescriptor>,
) -> Result<Delivered, JobError> {
    ctx.transition(job, JobState::Selecting).await;
    let payload = select_payload(&files, ctx.config.relay.selection).await?;
    let file_name = payload
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "payload".to_string());
    tracing::info!(
        job_id = ctx.id.0,
        file = %file_name,
        size_bytes = payload.size_bytes,
        candidates = files.len(),
        "Selected payload"
    );

    let limit = ctx.config.transport.max_upload_bytes;
    if payload.size_bytes <= limit {
        ctx.transition(job, JobState::Delivering).await;
        let file = OutgoingFile::new(payload.path.clone(), payload.size_bytes);
        send_file(ctx, job, &file, "Uploading").await?;
        return Ok(Delivered {
            file_name,
            parts: 1,
            size_bytes: payload.size_bytes,
        });
    }

    ctx.transition(job, JobState::Splitting).await;
    let parts_dir = job.storage_dir.join("parts");
    tokio::fs::create_dir_all(&parts_dir)
        .await
        .map_err(|e| {
            JobError::Storage(format!("failed to create {}: {e}", parts_dir.display()))
        })?;

    let mut splitter = PayloadSplitter::new(&payload.path, limit, &parts_dir).await?;
    let total = splitter.part_count();
    tracing::info!(
        job_id = ctx.id.0,
        parts = total,
        source_bytes = splitter.source_size(),
        limit_bytes = limit,
        "Payload exceeds upload limit, splitting"
    );

    loop {
        if ctx.cancel.is_cancelled() {
            return Err(JobError::CancelledByUser);
        }
        let Some(part) = splitter.next_part().await? else {
            break;
        };

        if part.index == total {
            // Every byte now lives in a part, the source is no longer needed
            if let Err(e) = tokio::fs::remove_file(&payload.path).await {
                tracing::warn!(job_id = ctx.id.0, error = %e, "Failed to remove split source");
            }
        }
        ctx.transition(job, JobState::Delivering).await;

        let file = OutgoingFile::new(part.path.clone(), part.size_bytes)
            .with_caption(format!("{file_name} part {}/{}", part.index, part.total));
        let headline = format!("Uploading part {}/{}", part.index, part.total);
        send_file(ctx, job, &file, &headline).await?;

        if let Err(e) = tokio::fs::remove_file(&part.path).await {
            tracing::warn!(
                job_id = ctx.id.0,
                part = part.index,
                error = %e,
                "Failed to remove sent part"
            );
        }
    }

    Ok(Delivered {
        file_name,
        parts: total,
        size_bytes: payload.size_bytes,
    })
}

/// Upload one file, honoring rate limits and relaying upload progress
async fn send_file(
    ctx: &JobContext,
    job: &Job,
    file: &OutgoingFile,
    headline: &str,
) -> Result<MessageRef, JobError> {
    let config = &ctx.config;
    let sent = ctx
        .unless_cancelled(async {
            with_rate_limit(&config.retry, config.relay.max_rate_limit_wait, || {
                upload_with_progress(ctx, job, file, headline)
            })
            .await
            .map_err(JobError::from)
        })
        .await?;

    tracing::info!(
        job_id = ctx.id.0,
        file = %file.file_name,
        size_bytes = file.size_bytes,
        message_id = sent.message_id,
        "Uploaded file"
    );
    Ok(sent)
}

/// A single upload attempt; progress reports become throttled status edits
async fn upload_with_progress(
    ctx: &JobContext,
    job: &Job,
    file: &OutgoingFile,
    headline: &str,
) -> Result<MessageRef, TransportError> {
    let (sink, mut progress) = ProgressSink::channel();
    let started = Instant::now();
    let upload = ctx.transport.send_file(job.destination, file, sink);
    tokio::pin!(upload);

    loop {
        tokio::select! {
            result = &mut upload => return result,
            changed = progress.changed() => {
                if changed.is_err() {
                    // The adapter dropped its sink; only the result is left to wait for
                    return upload.await;
                }
                let done = *progress.borrow_and_update();
                if let Some(status) = &job.status {
                    let secs = started.elapsed().as_secs();
                    let sample = ProgressSample {
                        done,
                        total: file.size_bytes,
                        rate: if secs == 0 { 0 } else { done / secs },
                    };
                    // Keep driving the upload while the edit is in flight
                    let edit = status.progress(ctx.id, headline, sample, job.elapsed());
                    tokio::pin!(edit);
                    tokio::select! {
                        result = &mut upload => return result,
                        () = &mut edit => {}
                    }
                }
            }
        }
    }
}
