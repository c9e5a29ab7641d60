//! Job finalization: engine stop, storage cleanup and final status edit.

use std::path::Path;

use crate::error::JobError;
use crate::format::{render_cancelled, render_failure, render_success};
use crate::types::{Event, JobState};

use super::context::{Job, JobContext};
use super::delivery::Delivered;

/// Bring a job to its terminal state.
///
/// Runs on every path out of the job task, in this order:
/// 1. Terminal state recorded in the registry (late cancels are refused from here on)
/// 2. Best-effort engine stop, bounded by `cancel_wait`
/// 3. Removal of the job's storage directory
/// 4. Final status edit (never throttled, bounded by `max_rate_limit_wait`)
/// 5. Registry removal and the `Finished` event
pub(super) async fn finalize_job(
    ctx: &JobContext,
    job: &mut Job,
    outcome: Result<Delivered, JobError>,
) {
    let id = ctx.id;
    let elapsed = job.elapsed();

    let proposed = match &outcome {
        Ok(_) => JobState::Done,
        Err(JobError::CancelledByUser) => JobState::Cancelled,
        Err(_) => JobState::Failed,
    };
    let state = ctx.registry.settle(id, proposed).await;
    let outcome = match outcome {
        Ok(delivered) if state == JobState::Cancelled => {
            tracing::info!(
                job_id = id.0,
                parts = delivered.parts,
                "Cancel arrived after delivery finished, reporting the job as cancelled"
            );
            Err(JobError::CancelledByUser)
        }
        other => other,
    };

    let (text, error) = match &outcome {
        Ok(delivered) => (
            render_success(
                &delivered.file_name,
                delivered.parts,
                delivered.size_bytes,
                elapsed,
            ),
            None,
        ),
        Err(JobError::CancelledByUser) => (
            render_cancelled(elapsed),
            Some(JobError::CancelledByUser.to_string()),
        ),
        Err(e) => (
            render_failure(&e.to_string(), elapsed),
            Some(e.to_string()),
        ),
    };

    if let Some(handle) = job.engine_handle() {
        let wait = ctx.config.relay.cancel_wait;
        match tokio::time::timeout(wait, ctx.engine.cancel(handle)).await {
            Ok(Ok(())) => {
                tracing::debug!(job_id = id.0, handle = %handle, "Engine transfer released");
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    job_id = id.0,
                    handle = %handle,
                    error = %e,
                    "Engine cancel failed"
                );
            }
            Err(_) => {
                tracing::warn!(
                    job_id = id.0,
                    handle = %handle,
                    wait_secs = wait.as_secs(),
                    "Engine did not acknowledge cancel in time"
                );
            }
        }
    }

    remove_storage(id.0, &job.storage_dir).await;

    if let Some(status) = &job.status {
        let bound = ctx.config.relay.max_rate_limit_wait;
        match tokio::time::timeout(bound, status.flush(&ctx.config, &text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(job_id = id.0, error = %e, "Failed to write final status message");
            }
            Err(_) => {
                tracing::error!(
                    job_id = id.0,
                    bound_secs = bound.as_secs(),
                    "Gave up on the final status message, still rate limited"
                );
            }
        }
    }

    job.state = state;
    ctx.registry.remove(id).await;
    ctx.event_tx
        .send(Event::Finished { id, state, error })
        .ok();

    let locator = job.locator.as_display();
    match outcome {
        Ok(delivered) => tracing::info!(
            job_id = id.0,
            locator = %locator,
            user = job.requested_by.0,
            parts = delivered.parts,
            size_bytes = delivered.size_bytes,
            elapsed_secs = elapsed.as_secs(),
            "Job done"
        ),
        Err(JobError::CancelledByUser) => tracing::warn!(
            job_id = id.0,
            locator = %locator,
            user = job.requested_by.0,
            elapsed_secs = elapsed.as_secs(),
            "Job cancelled"
        ),
        Err(e) => tracing::error!(
            job_id = id.0,
            locator = %locator,
            user = job.requested_by.0,
            code = e.code(),
            error = %e,
            elapsed_secs = elapsed.as_secs(),
            "Job failed"
        ),
    }
}

async fn remove_storage(job_id: i64, dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => tracing::debug!(job_id, dir = %dir.display(), "Removed job storage"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::error!(
                job_id,
                dir = %dir.display(),
                error = %e,
                "Failed to remove job storage"
            );
        }
    }
}
