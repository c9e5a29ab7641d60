//! Shared test helpers: a scripted fetch engine, a recording transport and a relay factory.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::config::{Config, RetryConfig};
use crate::engine::FetchEngine;
use crate::error::{EngineError, TransportError};
use crate::relay::Relay;
use crate::transport::{OutgoingFile, ProgressSink, Transport};
use crate::types::{
    ChatRef, EngineHandle, Event, FetchPhase, FetchStatus, FileDescriptor, JobId, JobState,
    Locator, MessageRef,
};

pub(crate) fn active(done: u64, total: u64) -> Result<FetchStatus, EngineError> {
    Ok(FetchStatus::progress(FetchPhase::Active, done, total, 100))
}

pub(crate) fn metadata() -> Result<FetchStatus, EngineError> {
    Ok(FetchStatus::progress(FetchPhase::Metadata, 0, 0, 0))
}

pub(crate) fn complete(total: u64) -> Result<FetchStatus, EngineError> {
    Ok(FetchStatus::progress(FetchPhase::Complete, total, total, 0))
}

pub(crate) fn handoff(next: &str) -> Result<FetchStatus, EngineError> {
    let mut status = FetchStatus::progress(FetchPhase::Complete, 100, 100, 0);
    status.handoff_handle = Some(EngineHandle::new(next));
    Ok(status)
}

pub(crate) fn engine_error(detail: &str) -> Result<FetchStatus, EngineError> {
    let mut status = FetchStatus::progress(FetchPhase::Error, 0, 0, 0);
    status.error_detail = Some(detail.to_string());
    Ok(status)
}

/// Fetch engine that replays scripted poll results per handle
///
/// The last scripted poll of a handle repeats forever. Files registered with
/// [`with_files`](Self::with_files) are written into the submitted directory
/// when they are listed, so they live in the job's storage like real output.
pub(crate) struct ScriptedEngine {
    first_handle: String,
    submit_error: Option<EngineError>,
    polls: Mutex<HashMap<String, VecDeque<Result<FetchStatus, EngineError>>>>,
    files: HashMap<String, Vec<(String, Vec<u8>)>>,
    submit_dir: Mutex<Option<PathBuf>>,
    pub(crate) submitted: Mutex<Vec<Locator>>,
    pub(crate) polled: Mutex<Vec<String>>,
    pub(crate) listed: Mutex<Vec<String>>,
    pub(crate) cancelled: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub(crate) fn new(first_handle: &str) -> Self {
        Self {
            first_handle: first_handle.to_string(),
            submit_error: None,
            polls: Mutex::new(HashMap::new()),
            files: HashMap::new(),
            submit_dir: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
            polled: Mutex::new(Vec::new()),
            listed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_polls(
        self,
        handle: &str,
        polls: Vec<Result<FetchStatus, EngineError>>,
    ) -> Self {
        self.polls
            .lock()
            .unwrap()
            .insert(handle.to_string(), polls.into());
        self
    }

    /// Register output files for `handle` as (name, content)
    pub(crate) fn with_files(mut self, handle: &str, files: Vec<(&str, Vec<u8>)>) -> Self {
        self.files.insert(
            handle.to_string(),
            files
                .into_iter()
                .map(|(name, content)| (name.to_string(), content))
                .collect(),
        );
        self
    }

    pub(crate) fn failing_submit(mut self, error: EngineError) -> Self {
        self.submit_error = Some(error);
        self
    }

    pub(crate) fn submit_dir(&self) -> Option<PathBuf> {
        self.submit_dir.lock().unwrap().clone()
    }

    pub(crate) fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub(crate) fn listed(&self) -> Vec<String> {
        self.listed.lock().unwrap().clone()
    }

    pub(crate) fn polled(&self) -> Vec<String> {
        self.polled.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchEngine for ScriptedEngine {
    async fn submit(&self, locator: &Locator, dir: &Path) -> Result<EngineHandle, EngineError> {
        self.submitted.lock().unwrap().push(locator.clone());
        if let Some(err) = &self.submit_error {
            return Err(err.clone());
        }
        *self.submit_dir.lock().unwrap() = Some(dir.to_path_buf());
        Ok(EngineHandle::new(self.first_handle.clone()))
    }

    async fn poll(&self, handle: &EngineHandle) -> Result<FetchStatus, EngineError> {
        self.polled.lock().unwrap().push(handle.as_str().to_string());
        let mut polls = self.polls.lock().unwrap();
        let queue = polls
            .get_mut(handle.as_str())
            .ok_or_else(|| EngineError::Rpc {
                method: "poll".into(),
                code: 1,
                message: format!("unknown handle {handle}"),
            })?;
        match queue.len() {
            0 => Err(EngineError::InvalidResponse("empty poll script".into())),
            1 => queue[0].clone(),
            _ => queue.pop_front().unwrap(),
        }
    }

    async fn list_files(&self, handle: &EngineHandle) -> Result<Vec<FileDescriptor>, EngineError> {
        self.listed.lock().unwrap().push(handle.as_str().to_string());
        let dir = self.submit_dir().unwrap_or_default();
        let mut out = Vec::new();
        for (name, content) in self.files.get(handle.as_str()).into_iter().flatten() {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, content).unwrap();
            out.push(FileDescriptor {
                path,
                size_bytes: content.len() as u64,
            });
        }
        Ok(out)
    }

    async fn cancel(&self, handle: &EngineHandle) -> Result<(), EngineError> {
        self.cancelled
            .lock()
            .unwrap()
            .push(handle.as_str().to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// One upload the transport accepted
#[derive(Debug, Clone)]
pub(crate) struct Upload {
    pub(crate) file_name: String,
    pub(crate) caption: Option<String>,
    pub(crate) content: Vec<u8>,
}

/// Transport that records everything and fails according to a script
#[derive(Default)]
pub(crate) struct RecordingTransport {
    next_message_id: AtomicI64,
    send_message_errors: Mutex<VecDeque<TransportError>>,
    edit_errors: Mutex<VecDeque<TransportError>>,
    upload_script: Mutex<VecDeque<Option<TransportError>>>,
    edit_delay: Duration,
    upload_delay: Duration,
    pub(crate) messages: Mutex<Vec<String>>,
    pub(crate) edits: Mutex<Vec<String>>,
    pub(crate) uploads: Mutex<Vec<Upload>>,
    pub(crate) upload_attempts: Mutex<usize>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_send_message(self, errors: Vec<TransportError>) -> Self {
        *self.send_message_errors.lock().unwrap() = errors.into();
        self
    }

    pub(crate) fn failing_edits(self, errors: Vec<TransportError>) -> Self {
        *self.edit_errors.lock().unwrap() = errors.into();
        self
    }

    pub(crate) fn failing_uploads(self, errors: Vec<TransportError>) -> Self {
        self.with_upload_script(errors.into_iter().map(Some).collect())
    }

    /// Outcome per upload attempt in order: `None` succeeds, `Some` fails
    pub(crate) fn with_upload_script(self, script: Vec<Option<TransportError>>) -> Self {
        *self.upload_script.lock().unwrap() = script.into();
        self
    }

    /// Every edit takes `delay` to complete
    pub(crate) fn slow_edits(mut self, delay: Duration) -> Self {
        self.edit_delay = delay;
        self
    }

    /// Uploads pause for `delay` after reporting half their bytes
    pub(crate) fn slow_uploads(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    pub(crate) fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub(crate) fn edits(&self) -> Vec<String> {
        self.edits.lock().unwrap().clone()
    }

    pub(crate) fn last_edit(&self) -> Option<String> {
        self.edits.lock().unwrap().last().cloned()
    }

    pub(crate) fn upload_attempts(&self) -> usize {
        *self.upload_attempts.lock().unwrap()
    }

    fn message_ref(&self, chat: ChatRef) -> MessageRef {
        MessageRef {
            chat,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(&self, chat: ChatRef, text: &str) -> Result<MessageRef, TransportError> {
        if let Some(err) = self.send_message_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(self.message_ref(chat))
    }

    async fn edit_message(&self, _message: &MessageRef, text: &str) -> Result<(), TransportError> {
        if !self.edit_delay.is_zero() {
            tokio::time::sleep(self.edit_delay).await;
        }
        if let Some(err) = self.edit_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.edits.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn delete_message(&self, _message: &MessageRef) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_file(
        &self,
        chat: ChatRef,
        file: &OutgoingFile,
        progress: ProgressSink,
    ) -> Result<MessageRef, TransportError> {
        *self.upload_attempts.lock().unwrap() += 1;
        if let Some(Some(err)) = self.upload_script.lock().unwrap().pop_front() {
            return Err(err);
        }
        let content = tokio::fs::read(&file.path)
            .await
            .map_err(|e| TransportError::Io {
                path: file.path.clone(),
                reason: e.to_string(),
            })?;
        progress.report(content.len() as u64 / 2);
        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }
        progress.report(content.len() as u64);
        self.uploads.lock().unwrap().push(Upload {
            file_name: file.file_name.clone(),
            caption: file.caption.clone(),
            content,
        });
        Ok(self.message_ref(chat))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Config tuned for fast tests under paused time
pub(crate) fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.relay.storage_dir = temp_dir.path().join("downloads");
    config.relay.poll_interval = Duration::from_secs(1);
    config.relay.progress_interval = Duration::from_secs(3);
    config.relay.stall_timeout = Duration::from_secs(30);
    config.relay.cancel_wait = Duration::from_secs(1);
    config.relay.max_rate_limit_wait = Duration::from_secs(60);
    config.relay.shutdown_timeout = Duration::from_secs(10);
    config.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Create a relay over the given mocks with a temporary storage root.
/// Returns the relay and the tempdir (which must be kept alive).
pub(crate) async fn create_test_relay(
    engine: Arc<ScriptedEngine>,
    transport: Arc<RecordingTransport>,
) -> (Relay, TempDir) {
    create_test_relay_with(engine, transport, |_| {}).await
}

pub(crate) async fn create_test_relay_with(
    engine: Arc<ScriptedEngine>,
    transport: Arc<RecordingTransport>,
    tweak: impl FnOnce(&mut Config),
) -> (Relay, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);
    tweak(&mut config);
    let relay = Relay::new(config, engine, transport).await.unwrap();
    (relay, temp_dir)
}

/// Wait for the `Finished` event of `id`, returning its state and error text
pub(crate) async fn wait_finished(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    id: JobId,
) -> (JobState, Option<String>) {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(Event::Finished {
                    id: finished,
                    state,
                    error,
                }) if finished == id => return (state, error),
                Ok(_) => continue,
                Err(e) => panic!("event stream ended before job {id} finished: {e}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(3600), wait)
        .await
        .expect("job did not finish")
}

/// Wait until job `id` reaches `state`
pub(crate) async fn wait_for_state(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    id: JobId,
    state: JobState,
) {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(Event::StateChanged { id: changed, state: s }) if changed == id && s == state => {
                    return;
                }
                Ok(Event::Finished { id: finished, state: s, .. }) if finished == id => {
                    panic!("job {id} finished in {s:?} before reaching {state:?}")
                }
                Ok(_) => continue,
                Err(e) => panic!("event stream ended: {e}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(3600), wait)
        .await
        .expect("state not reached");
}

/// Collect every state a job passed through until it finished
pub(crate) async fn collect_states(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    id: JobId,
) -> Vec<JobState> {
    let wait = async {
        let mut states = Vec::new();
        loop {
            match events.recv().await {
                Ok(Event::StateChanged { id: changed, state }) if changed == id => {
                    states.push(state);
                }
                Ok(Event::Finished { id: finished, state, .. }) if finished == id => {
                    states.push(state);
                    return states;
                }
                Ok(_) => continue,
                Err(e) => panic!("event stream ended: {e}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(3600), wait)
        .await
        .expect("job did not finish")
}
