//! The fetch engine trait

use async_trait::async_trait;
use std::path::Path;

use crate::error::EngineError;
use crate::types::{EngineHandle, FetchStatus, FileDescriptor, Locator};

/// A download daemon driven purely by polling
///
/// Implementations must be cheap to share across job tasks (`Send + Sync`);
/// every job holds the same `Arc<dyn FetchEngine>`.
///
/// A poll that reports [`FetchPhase::Complete`](crate::types::FetchPhase::Complete)
/// together with a `handoff_handle` means the transfer behind `handle` only
/// produced metadata. Callers must continue with the new handle instead of
/// treating the transfer as finished.
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// Start fetching `locator` into `dir` and return the engine's handle for it
    async fn submit(&self, locator: &Locator, dir: &Path) -> Result<EngineHandle, EngineError>;

    /// Snapshot the current state of a transfer
    async fn poll(&self, handle: &EngineHandle) -> Result<FetchStatus, EngineError>;

    /// Files produced by a completed transfer
    async fn list_files(&self, handle: &EngineHandle) -> Result<Vec<FileDescriptor>, EngineError>;

    /// Stop a transfer and forget it
    ///
    /// Cancelling a handle the engine no longer knows about is not an error.
    async fn cancel(&self, handle: &EngineHandle) -> Result<(), EngineError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
