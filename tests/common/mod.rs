//! Mock aria2 daemon and Bot API servers for end-to-end relay tests

#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use fetch_relay::{Aria2Engine, Config, Event, JobId, JobState, Relay, TelegramTransport};

pub const BOT_TOKEN: &str = "123456:TEST";

pub fn rpc_ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": "1", "result": result }))
}

pub fn bot_ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": result }))
}

pub fn bot_error(code: u16, description: &str) -> ResponseTemplate {
    ResponseTemplate::new(code).set_body_json(json!({
        "ok": false,
        "error_code": code,
        "description": description,
    }))
}

/// Raw aria2 status for an active transfer
pub fn aria2_active(done: u64, total: u64) -> Value {
    json!({
        "gid": "ignored",
        "status": "active",
        "totalLength": total.to_string(),
        "completedLength": done.to_string(),
        "downloadSpeed": "1024",
    })
}

/// Raw aria2 status for a finished transfer, optionally followed by another gid
pub fn aria2_complete(total: u64, followed_by: Option<&str>) -> Value {
    let mut status = json!({
        "gid": "ignored",
        "status": "complete",
        "totalLength": total.to_string(),
        "completedLength": total.to_string(),
        "downloadSpeed": "0",
    });
    if let Some(next) = followed_by {
        status["followedBy"] = json!([next]);
    }
    status
}

/// Mount an aria2 method answer, optionally scoped to one gid and a number of calls
pub async fn mount_rpc(
    server: &MockServer,
    rpc_method: &str,
    gid: Option<&str>,
    times: Option<u64>,
    response: ResponseTemplate,
) {
    let mut mock = Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({ "method": rpc_method })));
    if let Some(gid) = gid {
        mock = mock.and(body_string_contains(format!("\"{gid}\"")));
    }
    let mock = mock.respond_with(response);
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

/// Mount the Bot API methods every job touches
pub async fn mount_bot_basics(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/bot[^/]+/sendMessage$"))
        .respond_with(bot_ok(json!({ "message_id": 100 })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/bot[^/]+/editMessageText$"))
        .respond_with(bot_ok(json!(true)))
        .mount(server)
        .await;
}

/// Mount the aria2 cleanup calls
pub async fn mount_aria2_cleanup(server: &MockServer) {
    mount_rpc(server, "aria2.forceRemove", None, None, rpc_ok(json!("OK"))).await;
    mount_rpc(server, "aria2.removeDownloadResult", None, None, rpc_ok(json!("OK"))).await;
}

pub struct Harness {
    pub aria2: MockServer,
    pub bot: MockServer,
    pub relay: Relay,
    pub temp_dir: TempDir,
}

impl Harness {
    /// Start both mock servers; mocks are mounted by the caller before `start_relay`
    pub async fn servers() -> (MockServer, MockServer, TempDir) {
        (
            MockServer::start().await,
            MockServer::start().await,
            TempDir::new().unwrap(),
        )
    }

    pub async fn start(
        aria2: MockServer,
        bot: MockServer,
        temp_dir: TempDir,
        tweak: impl FnOnce(&mut Config),
    ) -> Self {
        let mut config = Config::default();
        config.relay.storage_dir = temp_dir.path().join("downloads");
        config.relay.poll_interval = Duration::from_millis(50);
        config.relay.progress_interval = Duration::from_secs(1);
        config.relay.stall_timeout = Duration::from_secs(10);
        config.relay.cancel_wait = Duration::from_secs(2);
        config.retry.max_attempts = 1;
        config.retry.initial_delay = Duration::from_millis(10);
        config.retry.jitter = false;
        config.engine.rpc_url = format!("{}/jsonrpc", aria2.uri());
        config.transport.api_base = bot.uri();
        config.transport.bot_token = BOT_TOKEN.to_string();
        tweak(&mut config);

        let engine = Arc::new(Aria2Engine::new(&config.engine).unwrap());
        let transport = Arc::new(TelegramTransport::new(&config.transport).unwrap());
        let relay = Relay::new(config, engine, transport).await.unwrap();

        Self {
            aria2,
            bot,
            relay,
            temp_dir,
        }
    }

    /// Storage directory a job with `id` will use
    pub fn job_dir(&self, id: i64) -> std::path::PathBuf {
        self.relay.get_config().storage_dir().join(format!("job_{id}"))
    }

    pub async fn bot_requests(&self, api_method: &str) -> Vec<Request> {
        let suffix = format!("/{api_method}");
        self.bot
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path().ends_with(&suffix))
            .collect()
    }

    pub async fn rpc_methods(&self) -> Vec<String> {
        self.aria2
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                let body: Value = serde_json::from_slice(&r.body).ok()?;
                Some(body["method"].as_str()?.to_string())
            })
            .collect()
    }

    /// Text of the last status message edit
    pub async fn last_edit_text(&self) -> Option<String> {
        let edits = self.bot_requests("editMessageText").await;
        let last = edits.last()?;
        let body: Value = serde_json::from_slice(&last.body).ok()?;
        body["text"].as_str().map(str::to_string)
    }
}

/// Wait (in real time) for the job's `Finished` event
pub async fn wait_finished(
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
    tokio::time::timeout(Duration::from_secs(30), wait)
        .await
        .expect("job did not finish in time")
}
