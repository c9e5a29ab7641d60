//! Job task context: shared handles, the job record and its status message.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::engine::FetchEngine;
use crate::error::{JobError, TransportError};
use crate::format::{ProgressSample, render_progress};
use crate::retry::with_rate_limit;
use crate::throttle::ProgressThrottle;
use crate::transport::Transport;
use crate::types::{ChatRef, EngineHandle, Event, JobId, JobState, Locator, MessageRef, UserRef};

use super::super::JobRegistry;

/// Shared handles for a single job task, reducing parameter passing between helpers.
pub(crate) struct JobContext {
    pub(crate) id: JobId,
    pub(crate) config: Arc<Config>,
    pub(crate) engine: Arc<dyn FetchEngine>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) registry: JobRegistry,
    pub(crate) fetch_gate: Arc<tokio::sync::Semaphore>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) cancel: CancellationToken,
}

impl JobContext {
    /// Move the job to `state`, mirroring it into the registry and emitting an event
    pub(crate) async fn transition(&self, job: &mut Job, state: JobState) {
        if job.state == state {
            return;
        }
        tracing::debug!(
            job_id = self.id.0,
            from = job.state.label(),
            to = state.label(),
            "State transition"
        );
        job.state = state;
        self.registry.set_state(self.id, state).await;
        self.event_tx
            .send(Event::StateChanged { id: self.id, state })
            .ok();
    }

    /// Run `fut` unless the job is cancelled first
    pub(crate) async fn unless_cancelled<T>(
        &self,
        fut: impl Future<Output = Result<T, JobError>>,
    ) -> Result<T, JobError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(JobError::CancelledByUser),
            result = fut => result,
        }
    }
}

/// The job record, owned exclusively by its task
pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) locator: Locator,
    pub(crate) destination: ChatRef,
    pub(crate) requested_by: UserRef,
    pub(crate) state: JobState,
    /// The one live engine handle; only [`Job::replace_handle`] may swap it
    engine_handle: Option<EngineHandle>,
    pub(crate) status: Option<StatusMessage>,
    pub(crate) storage_dir: PathBuf,
    started: Instant,
    progress_interval: Duration,
}

impl Job {
    pub(crate) fn new(
        id: JobId,
        locator: Locator,
        destination: ChatRef,
        requested_by: UserRef,
        storage_dir: PathBuf,
        progress_interval: Duration,
    ) -> Self {
        Self {
            id,
            locator,
            destination,
            requested_by,
            state: JobState::Submitted,
            engine_handle: None,
            status: None,
            storage_dir,
            started: Instant::now(),
            progress_interval,
        }
    }

    pub(crate) fn engine_handle(&self) -> Option<&EngineHandle> {
        self.engine_handle.as_ref()
    }

    /// Record the handle returned by the initial submission
    pub(crate) fn attach_handle(&mut self, handle: EngineHandle) {
        self.engine_handle = Some(handle);
    }

    /// Retire the current handle in favour of `next`, returning the retired one
    pub(crate) fn replace_handle(&mut self, next: EngineHandle) -> Option<EngineHandle> {
        self.engine_handle.replace(next)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Attach the status message the job reports into
    pub(crate) fn attach_status(&mut self, message: MessageRef, transport: Arc<dyn Transport>) {
        self.status = Some(StatusMessage {
            transport,
            message,
            throttle: Mutex::new(ProgressThrottle::new(self.progress_interval)),
        });
    }
}

/// The single message a job edits in place, with its own throttle
pub(crate) struct StatusMessage {
    transport: Arc<dyn Transport>,
    message: MessageRef,
    throttle: Mutex<ProgressThrottle>,
}

impl StatusMessage {
    /// Edit in a progress sample if this job's throttle window allows it
    ///
    /// Progress edits are disposable: a rate-limit signal pushes the window
    /// out and any other failure is logged and dropped.
    pub(crate) async fn progress(
        &self,
        job_id: JobId,
        headline: &str,
        sample: ProgressSample,
        elapsed: Duration,
    ) {
        if !self.acquire_window() {
            return;
        }

        let text = render_progress(headline, sample, elapsed);
        match self.transport.edit_message(&self.message, &text).await {
            Ok(()) => {}
            Err(TransportError::RateLimited(wait)) => {
                tracing::debug!(
                    job_id = job_id.0,
                    wait_secs = wait.as_secs(),
                    "Progress edit rate limited, deferring"
                );
                self.defer(wait);
            }
            Err(e) => {
                tracing::warn!(job_id = job_id.0, error = %e, "Progress edit failed");
            }
        }
    }

    /// Write the final text, bypassing the throttle and honoring rate limits
    pub(crate) async fn flush(&self, config: &Config, text: &str) -> Result<(), TransportError> {
        with_rate_limit(&config.retry, config.relay.max_rate_limit_wait, || {
            self.transport.edit_message(&self.message, text)
        })
        .await
    }

    fn acquire_window(&self) -> bool {
        match self.throttle.lock() {
            Ok(mut throttle) => throttle.try_acquire(),
            Err(poisoned) => poisoned.into_inner().try_acquire(),
        }
    }

    fn defer(&self, wait: Duration) {
        match self.throttle.lock() {
            Ok(mut throttle) => throttle.defer(wait),
            Err(poisoned) => poisoned.into_inner().defer(wait),
        }
    }
}
