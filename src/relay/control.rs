//! Job control: submit, cancel, list.

use chrono::Utc;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::{ChatRef, Event, JobId, JobState, JobSummary, Locator, UserRef};

use super::Relay;
use super::job_task::{Job, JobContext, run_job};

impl Relay {
    /// Admit a job and start its task
    ///
    /// The job is registered before this returns, so it shows up in
    /// [`list_jobs`](Self::list_jobs) right away. Everything after admission
    /// (fetching, delivery, failures) is reported through the job's status
    /// message in `destination`, not through this call.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has started
    /// - [`Error::Unauthorized`] when `requested_by` fails the admission check
    /// - [`Error::InvalidLocator`] when `locator` is not a magnet, URL or torrent file
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use fetch_relay::{Relay, ChatRef, UserRef};
    /// # async fn example(relay: Relay) -> fetch_relay::Result<()> {
    /// let id = relay
    ///     .submit_job("magnet:?xt=urn:btih:abc", ChatRef(-1001), UserRef(42))
    ///     .await?;
    /// println!("queued job {id}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit_job(
        &self,
        locator: &str,
        destination: ChatRef,
        requested_by: UserRef,
    ) -> Result<JobId> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        if !self.config.admission.admits(requested_by.0) {
            tracing::warn!(user = requested_by.0, "Rejected job from unauthorized user");
            return Err(Error::Unauthorized(requested_by.0));
        }
        let locator = Locator::parse(locator)?;

        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let cancel = CancellationToken::new();
        let locator_text = locator.as_display();

        self.registry
            .insert(
                JobSummary {
                    id,
                    locator: locator_text.clone(),
                    state: JobState::Submitted,
                    created_at: Utc::now(),
                    destination,
                    requested_by,
                },
                cancel.clone(),
            )
            .await;

        tracing::info!(
            job_id = id.0,
            locator = %locator_text,
            chat = destination.0,
            user = requested_by.0,
            "Job submitted"
        );
        self.emit_event(Event::Submitted {
            id,
            locator: locator_text,
        });

        let job = Job::new(
            id,
            locator,
            destination,
            requested_by,
            self.config.storage_dir().join(format!("job_{}", id.0)),
            self.config.relay.progress_interval,
        );
        let ctx = JobContext {
            id,
            config: self.config.clone(),
            engine: self.engine.clone(),
            transport: self.transport.clone(),
            registry: self.registry.clone(),
            fetch_gate: self.fetch_gate.clone(),
            event_tx: self.event_tx.clone(),
            cancel,
        };
        tokio::spawn(run_job(ctx, job));

        Ok(id)
    }

    /// Ask a running job to stop
    ///
    /// Returns `true` if a live job was signalled. Unknown ids, finished jobs
    /// and jobs that were already cancelled return `false`. The job notices
    /// the request at its next suspension point, tells the engine to stop,
    /// deletes its local files and leaves the registry.
    pub async fn cancel_job(&self, id: JobId) -> bool {
        let signalled = self.registry.cancel(id).await;
        if signalled {
            tracing::info!(job_id = id.0, "Cancellation requested");
        } else {
            tracing::debug!(job_id = id.0, "Cancel ignored: job not found or already finishing");
        }
        signalled
    }

    /// Snapshot of every job that has not finished yet, ordered by id
    pub async fn list_jobs(&self) -> Vec<JobSummary> {
        self.registry.list().await
    }
}
