//! Job task execution -- the per-job state machine.
//!
//! Split into focused submodules:
//! - [`context`] - Shared handles, the job record and its status message
//! - [`orchestration`] - Top-level job lifecycle
//! - [`fetch`] - Engine submission, polling, metadata hand-off and stall detection
//! - [`delivery`] - Payload selection, splitting and uploads
//! - [`finalization`] - Engine stop, storage cleanup, final status edit

mod context;
mod delivery;
mod fetch;
mod finalization;
mod orchestration;


pub(crate) use context::{Job, JobContext};
pub(crate) use orchestration::run_job;
