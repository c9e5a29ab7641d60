//! Fetch phase: submission, polling, metadata hand-off and stall detection.

use tokio::time::Instant;

use crate::error::JobError;
use crate::format::ProgressSample;
use crate::retry::with_retry;
use crate::types::{FetchPhase, FetchStatus, FileDescriptor, JobState};

use super::context::{Job, JobContext};

/// What a poll looked like, used to tell progress from a wedged transfer
#[derive(PartialEq, Eq)]
struct Fingerprint {
    handle: String,
    phase: FetchPhase,
    completed_bytes: u64,
    total_bytes: u64,
}

impl Fingerprint {
    fn of(handle: &str, status: &FetchStatus) -> Self {
        Self {
            handle: handle.to_string(),
            phase: status.phase,
            completed_bytes: status.completed_bytes,
            total_bytes: status.total_bytes,
        }
    }
}

/// Submit the locator and poll until the engine reports the content complete
///
/// Returns the engine's file list for the final handle.
pub(super) async fn fetch_payload(
    ctx: &JobContext,
    job: &mut Job,
) -> Result<Vec<FileDescriptor>, JobError> {
    let retry = &ctx.config.retry;
    let dir = job.storage_dir.clone();

    let handle = ctx
        .unless_cancelled(async {
            with_retry(retry, || ctx.engine.submit(&job.locator, &dir))
                .await
                .map_err(JobError::from)
        })
        .await?;
    tracing::info!(
        job_id = ctx.id.0,
        handle = %handle,
        engine = ctx.engine.name(),
        "Submitted to fetch engine"
    );
    job.attach_handle(handle);

    let first_state = if job.locator.needs_metadata() {
        JobState::MetadataResolving
    } else {
        JobState::Fetching
    };
    ctx.transition(job, first_state).await;

    poll_until_complete(ctx, job).await?;

    let handle = job
        .engine_handle()
        .cloned()
        .ok_or_else(|| JobError::FetchFailed("no engine handle to list files from".to_string()))?;
    ctx.unless_cancelled(async {
        with_retry(retry, || ctx.engine.list_files(&handle))
            .await
            .map_err(JobError::from)
    })
    .await
}

async fn poll_until_complete(ctx: &JobContext, job: &mut Job) -> Result<(), JobError> {
    let relay = &ctx.config.relay;
    let mut last_seen: Option<Fingerprint> = None;
    let mut last_change = Instant::now();

    loop {
        let handle = job
            .engine_handle()
            .cloned()
            .ok_or_else(|| JobError::FetchFailed("no engine handle to poll".to_string()))?;

        let status = ctx
            .unless_cancelled(async {
                with_retry(&ctx.config.retry, || ctx.engine.poll(&handle))
                    .await
                    .map_err(JobError::from)
            })
            .await?;

        let fingerprint = Fingerprint::of(handle.as_str(), &status);
        if last_seen.as_ref() != Some(&fingerprint) {
            last_seen = Some(fingerprint);
            last_change = Instant::now();
        } else if last_change.elapsed() >= relay.stall_timeout {
            tracing::warn!(
                job_id = ctx.id.0,
                handle = %handle,
                stalled_secs = last_change.elapsed().as_secs(),
                "Fetch made no progress within the stall timeout"
            );
            return Err(JobError::StallTimeout(relay.stall_timeout));
        }

        match status.phase {
            FetchPhase::Complete => match status.handoff_handle {
                Some(next) => {
                    // Metadata finished; the content transfer continues under a new handle
                    let retired = job.replace_handle(next.clone());
                    tracing::info!(
                        job_id = ctx.id.0,
                        retired = ?retired.as_ref().map(|h| h.as_str()),
                        handle = %next,
                        "Metadata resolved, following hand-off"
                    );
                    ctx.transition(job, JobState::Fetching).await;
                    continue;
                }
                None => {
                    tracing::info!(
                        job_id = ctx.id.0,
                        total_bytes = status.total_bytes,
                        "Fetch complete"
                    );
                    ctx.transition(job, JobState::FetchComplete).await;
                    return Ok(());
                }
            },
            FetchPhase::Error => {
                let detail = status
                    .error_detail
                    .unwrap_or_else(|| "the fetch engine reported an error".to_string());
                return Err(JobError::FetchFailed(detail));
            }
            FetchPhase::Removed => {
                return Err(JobError::FetchFailed(
                    "the transfer was removed from the fetch engine".to_string(),
                ));
            }
            FetchPhase::Metadata => {
                report(ctx, job, "Fetching metadata", &status).await;
            }
            FetchPhase::Active => {
                if job.state == JobState::MetadataResolving {
                    ctx.transition(job, JobState::Fetching).await;
                }
                report(ctx, job, "Downloading", &status).await;
            }
        }

        ctx.unless_cancelled(async {
            tokio::time::sleep(relay.poll_interval).await;
            Ok(())
        })
        .await?;
    }
}

async fn report(ctx: &JobContext, job: &Job, headline: &str, status: &FetchStatus) {
    if let Some(message) = &job.status {
        let sample = ProgressSample {
            done: status.completed_bytes,
            total: status.total_bytes,
            rate: status.rate_bytes_per_sec,
        };
        message
            .progress(ctx.id, headline, sample, job.elapsed())
            .await;
    }
}
