//! Job task orchestration: top-level lifecycle for a single job.

use crate::error::JobError;
use crate::retry::with_rate_limit;

use super::context::{Job, JobContext};
use super::delivery::{Delivered, deliver_payload};
use super::fetch::fetch_payload;
use super::finalization::finalize_job;

/// Core job task -- orchestrates the full lifecycle of a single job.
///
/// Phases:
/// 1. Post the status message the job reports into
/// 2. Wait for a fetch slot (admission gate)
/// 3. Fetch, following a metadata hand-off if one occurs
/// 4. Select, split and deliver the payload
/// 5. Finalize: final edit, engine stop, storage cleanup, registry removal
///
/// Every path out of phases 1-4 goes through phase 5.
pub(crate) async fn run_job(ctx: JobContext, mut job: Job) {
    let outcome = drive(&ctx, &mut job).await;
    finalize_job(&ctx, &mut job, outcome).await;
}

async fn drive(ctx: &JobContext, job: &mut Job) -> Result<Delivered, JobError> {
    post_status_message(ctx, job).await?;

    tokio::fs::create_dir_all(&job.storage_dir)
        .await
        .map_err(|e| {
            JobError::Storage(format!(
                "failed to create {}: {e}",
                job.storage_dir.display()
            ))
        })?;

    let permit = ctx
        .unless_cancelled(async {
            ctx.fetch_gate
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| JobError::Storage("fetch admission gate is closed".to_string()))
        })
        .await?;
    tracing::debug!(job_id = ctx.id.0, "Acquired fetch slot");

    let fetched = fetch_payload(ctx, job).await;
    // The slot only bounds concurrent fetches; delivery does not hold it
    drop(permit);
    let files = fetched?;

    deliver_payload(ctx, job, files).await
}

async fn post_status_message(ctx: &JobContext, job: &mut Job) -> Result<(), JobError> {
    let text = format!("⏳ Queued: {}", job.locator.as_display());
    let config = &ctx.config;
    let destination = job.destination;

    let message = ctx
        .unless_cancelled(async {
            with_rate_limit(&config.retry, config.relay.max_rate_limit_wait, || {
                ctx.transport.send_message(destination, &text)
            })
            .await
            .map_err(JobError::from)
        })
        .await?;

    job.attach_status(message, ctx.transport.clone());
    Ok(())
}
