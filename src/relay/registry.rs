//! Process-wide registry of running jobs
//!
//! The registry is the only structure shared between job tasks. It holds a
//! summary per job for listing and the token used to cancel the owning task.
//! A job's own state lives in its task; the summary here is a copy the task
//! refreshes on every transition.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::types::{JobId, JobState, JobSummary};

struct JobEntry {
    summary: JobSummary,
    cancel: CancellationToken,
}

/// Map of job id to summary and cancellation token
#[derive(Clone, Default)]
pub(crate) struct JobRegistry {
    jobs: Arc<Mutex<HashMap<JobId, JobEntry>>>,
}

impl JobRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a newly admitted job
    pub(crate) async fn insert(&self, summary: JobSummary, cancel: CancellationToken) {
        let mut jobs = self.jobs.lock().await;
        jobs.insert(summary.id, JobEntry { summary, cancel });
    }

    /// Refresh the listed state of a job
    pub(crate) async fn set_state(&self, id: JobId, state: JobState) {
        if let Some(entry) = self.jobs.lock().await.get_mut(&id) {
            entry.summary.state = state;
        }
    }

    /// Record a job's terminal state, returning the state it actually ends in
    ///
    /// A job that was signalled before settling ends `Cancelled` even if its
    /// work completed, so a cancel that returned true is never contradicted.
    /// Once settled the job rejects further cancel requests.
    pub(crate) async fn settle(&self, id: JobId, state: JobState) -> JobState {
        let mut jobs = self.jobs.lock().await;
        let Some(entry) = jobs.get_mut(&id) else {
            return state;
        };
        let settled = if state == JobState::Done && entry.cancel.is_cancelled() {
            JobState::Cancelled
        } else {
            state
        };
        entry.summary.state = settled;
        settled
    }

    /// Drop a job; returns whether it was registered
    pub(crate) async fn remove(&self, id: JobId) -> bool {
        self.jobs.lock().await.remove(&id).is_some()
    }

    /// Signal a job's task to stop
    ///
    /// Returns false when the id is unknown, the job already reached a
    /// terminal state, or it was cancelled before.
    pub(crate) async fn cancel(&self, id: JobId) -> bool {
        let jobs = self.jobs.lock().await;
        match jobs.get(&id) {
            Some(entry) if !entry.summary.state.is_terminal() && !entry.cancel.is_cancelled() => {
                entry.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Signal every live job; returns how many were signalled
    pub(crate) async fn cancel_all(&self) -> usize {
        let jobs = self.jobs.lock().await;
        let mut signalled = 0;
        for (id, entry) in jobs.iter() {
            if !entry.summary.state.is_terminal() && !entry.cancel.is_cancelled() {
                tracing::debug!(job_id = id.0, "Signalling cancellation");
                entry.cancel.cancel();
                signalled += 1;
            }
        }
        signalled
    }

    /// Snapshot of every registered job, ordered by id
    pub(crate) async fn list(&self) -> Vec<JobSummary> {
        let jobs = self.jobs.lock().await;
        let mut summaries: Vec<JobSummary> = jobs.values().map(|e| e.summary.clone()).collect();
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    pub(crate) async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }
}
