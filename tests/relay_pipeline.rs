//! End-to-end relay tests against mock aria2 and Bot API servers
//!
//! The real [`Aria2Engine`](fetch_relay::Aria2Engine) and
//! [`TelegramTransport`](fetch_relay::TelegramTransport) adapters talk HTTP to
//! wiremock servers, so these tests cover the wire formats together with the
//! job state machine.
//!
//! ```bash
//! cargo test --test relay_pipeline
//! ```

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use serde_json::json;
use common::*;
use wiremock::Mock;
use wiremock::matchers::{method, path_regex};

use fetch_relay::{ChatRef, JobState, UserRef};

#[tokio::test]
async fn url_job_is_fetched_uploaded_and_cleaned_up() {
    let (aria2, bot, temp_dir) = Harness::servers().await;
    let payload_path = temp_dir.path().join("downloads/job_1/notes.txt");

    mount_rpc(&aria2, "aria2.addUri", None, None, rpc_ok(json!("gid-1"))).await;
    mount_rpc(&aria2, "aria2.tellStatus", None, Some(2), rpc_ok(aria2_active(4, 11))).await;
    mount_rpc(&aria2, "aria2.tellStatus", None, None, rpc_ok(aria2_complete(11, None))).await;
    mount_rpc(
        &aria2,
        "aria2.getFiles",
        None,
        None,
        rpc_ok(json!([{
            "index": "1",
            "path": payload_path.to_string_lossy(),
            "length": "11",
            "completedLength": "11",
            "selected": "true",
        }])),
    )
    .await;
    mount_aria2_cleanup(&aria2).await;
    mount_bot_basics(&bot).await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/bot[^/]+/sendDocument$"))
        .respond_with(bot_ok(json!({ "message_id": 101 })))
        .mount(&bot)
        .await;

    let harness = Harness::start(aria2, bot, temp_dir, |_| {}).await;
    std::fs::create_dir_all(harness.job_dir(1)).unwrap();
    std::fs::write(&payload_path, b"hello relay").unwrap();

    let mut events = harness.relay.subscribe();
    let id = harness
        .relay
        .submit_job("https://example.com/notes.txt", ChatRef(-1001), UserRef(42))
        .await
        .unwrap();
    let (state, error) = wait_finished(&mut events, id).await;

    assert_eq!(state, JobState::Done, "unexpected failure: {error:?}");

    let uploads = harness.bot_requests("sendDocument").await;
    assert_eq!(uploads.len(), 1);
    let body = String::from_utf8_lossy(&uploads[0].body);
    assert!(body.contains("hello relay"), "upload carries the file content");
    assert!(body.contains("notes.txt"), "upload carries the file name");

    let last = harness.last_edit_text().await.unwrap();
    assert!(last.starts_with("✅"), "final edit: {last}");

    let methods = harness.rpc_methods().await;
    assert!(methods.contains(&"aria2.forceRemove".to_string()));
    assert!(!harness.job_dir(id.0).exists(), "job storage removed");
    assert!(harness.relay.list_jobs().await.is_empty());
}

#[tokio::test]
async fn magnet_metadata_handoff_is_followed_to_the_content_transfer() {
    let (aria2, bot, temp_dir) = Harness::servers().await;
    let payload_path = temp_dir.path().join("downloads/job_1/Show/episode.mkv");

    mount_rpc(&aria2, "aria2.addUri", None, None, rpc_ok(json!("meta-gid"))).await;
    mount_rpc(
        &aria2,
        "aria2.tellStatus",
        Some("meta-gid"),
        None,
        rpc_ok(aria2_complete(300, Some("content-gid"))),
    )
    .await;
    mount_rpc(
        &aria2,
        "aria2.tellStatus",
        Some("content-gid"),
        None,
        rpc_ok(aria2_complete(8, None)),
    )
    .await;
    mount_rpc(
        &aria2,
        "aria2.getFiles",
        Some("content-gid"),
        None,
        rpc_ok(json!([
            { "path": "[METADATA]abcdef", "length": "300", "selected": "true" },
            { "path": payload_path.to_string_lossy(), "length": "8", "selected": "true" },
        ])),
    )
    .await;
    mount_aria2_cleanup(&aria2).await;
    mount_bot_basics(&bot).await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/bot[^/]+/sendVideo$"))
        .respond_with(bot_ok(json!({ "message_id": 101 })))
        .mount(&bot)
        .await;

    let harness = Harness::start(aria2, bot, temp_dir, |_| {}).await;
    std::fs::create_dir_all(payload_path.parent().unwrap()).unwrap();
    std::fs::write(&payload_path, b"episode!").unwrap();

    let mut events = harness.relay.subscribe();
    let id = harness
        .relay
        .submit_job("magnet:?xt=urn:btih:abcdef", ChatRef(5), UserRef(6))
        .await
        .unwrap();
    let (state, error) = wait_finished(&mut events, id).await;

    assert_eq!(state, JobState::Done, "unexpected failure: {error:?}");
    assert_eq!(harness.bot_requests("sendVideo").await.len(), 1);

    let methods = harness.rpc_methods().await;
    assert_eq!(
        methods.iter().filter(|m| *m == "aria2.getFiles").count(),
        1,
        "files are listed once, for the content transfer"
    );
}

#[tokio::test]
async fn rejected_upload_fails_the_job_and_reports_it() {
    let (aria2, bot, temp_dir) = Harness::servers().await;
    let payload_path = temp_dir.path().join("downloads/job_1/data.bin");

    mount_rpc(&aria2, "aria2.addUri", None, None, rpc_ok(json!("gid-1"))).await;
    mount_rpc(&aria2, "aria2.tellStatus", None, None, rpc_ok(aria2_complete(4, None))).await;
    mount_rpc(
        &aria2,
        "aria2.getFiles",
        None,
        None,
        rpc_ok(json!([{ "path": payload_path.to_string_lossy(), "length": "4" }])),
    )
    .await;
    mount_aria2_cleanup(&aria2).await;
    mount_bot_basics(&bot).await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/bot[^/]+/sendDocument$"))
        .respond_with(bot_error(400, "Bad Request: chat not found"))
        .mount(&bot)
        .await;

    let harness = Harness::start(aria2, bot, temp_dir, |_| {}).await;
    std::fs::create_dir_all(harness.job_dir(1)).unwrap();
    std::fs::write(&payload_path, b"data").unwrap();

    let mut events = harness.relay.subscribe();
    let id = harness
        .relay
        .submit_job("https://example.com/data.bin", ChatRef(1), UserRef(1))
        .await
        .unwrap();
    let (state, error) = wait_finished(&mut events, id).await;

    assert_eq!(state, JobState::Failed);
    assert!(error.unwrap().contains("chat not found"));
    let last = harness.last_edit_text().await.unwrap();
    assert!(last.starts_with("❌"), "final edit: {last}");
    assert!(!harness.job_dir(id.0).exists());
}

#[tokio::test]
async fn aria2_error_message_reaches_the_status_message() {
    let (aria2, bot, temp_dir) = Harness::servers().await;

    mount_rpc(&aria2, "aria2.addUri", None, None, rpc_ok(json!("gid-1"))).await;
    mount_rpc(
        &aria2,
        "aria2.tellStatus",
        None,
        None,
        rpc_ok(json!({
            "gid": "gid-1",
            "status": "error",
            "totalLength": "0",
            "completedLength": "0",
            "downloadSpeed": "0",
            "errorCode": "1",
            "errorMessage": "No URI available.",
        })),
    )
    .await;
    mount_aria2_cleanup(&aria2).await;
    mount_bot_basics(&bot).await;

    let harness = Harness::start(aria2, bot, temp_dir, |_| {}).await;
    let mut events = harness.relay.subscribe();
    let id = harness
        .relay
        .submit_job("https://example.com/gone.iso", ChatRef(1), UserRef(1))
        .await
        .unwrap();
    let (state, error) = wait_finished(&mut events, id).await;

    assert_eq!(state, JobState::Failed);
    assert_eq!(error.as_deref(), Some("download failed: No URI available."));
    let last = harness.last_edit_text().await.unwrap();
    assert!(last.contains("No URI available."), "final edit: {last}");
}

#[tokio::test]
async fn shutdown_stops_a_running_transfer() {
    let (aria2, bot, temp_dir) = Harness::servers().await;

    mount_rpc(&aria2, "aria2.addUri", None, None, rpc_ok(json!("gid-1"))).await;
    // Growing counters keep the stall detector quiet while shutdown runs
    for done in 1..200u64 {
        mount_rpc(
            &aria2,
            "aria2.tellStatus",
            None,
            Some(1),
            rpc_ok(aria2_active(done, 10_000)),
        )
        .await;
    }
    mount_aria2_cleanup(&aria2).await;
    mount_bot_basics(&bot).await;

    let harness = Harness::start(aria2, bot, temp_dir, |_| {}).await;
    let mut events = harness.relay.subscribe();
    let id = harness
        .relay
        .submit_job("https://example.com/huge.iso", ChatRef(1), UserRef(1))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    harness.relay.shutdown().await.unwrap();

    let (state, _) = wait_finished(&mut events, id).await;
    assert_eq!(state, JobState::Cancelled);
    assert!(
        harness
            .rpc_methods()
            .await
            .contains(&"aria2.forceRemove".to_string())
    );
    assert!(harness.relay.list_jobs().await.is_empty());
}
