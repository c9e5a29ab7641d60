//! Relay demo
//!
//! Submits every command-line argument as a job and relays the results into
//! one chat, then waits for Ctrl+C / SIGTERM and shuts down gracefully.
//!
//! ```bash
//! aria2c --enable-rpc --rpc-secret=s3cret &
//! TELEGRAM_BOT_TOKEN=123:abc RELAY_CHAT_ID=-1001 ARIA2_SECRET=s3cret \
//!     cargo run --example relay -- "magnet:?xt=urn:btih:..." https://example.com/file.iso
//! ```
//!
//! Environment:
//! - `TELEGRAM_BOT_TOKEN` - bot token (required)
//! - `RELAY_CHAT_ID` - chat that receives status messages and files (required)
//! - `RELAY_USER_ID` - user the jobs are attributed to (default: 0)
//! - `ARIA2_RPC_URL` - aria2 JSON-RPC endpoint (default: http://localhost:6800/jsonrpc)
//! - `ARIA2_SECRET` - aria2 `--rpc-secret` (optional)
//! - `RELAY_STORAGE_DIR` - working directory for downloads (default: ./downloads)
//! - `RUST_LOG` - log filter (default: fetch_relay=info)

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use fetch_relay::{
    Aria2Engine, ChatRef, Config, Event, Relay, TelegramTransport, UserRef, run_with_shutdown,
};

fn required_env(key: &str) -> Result<String, Box<dyn std::error::Error>> {
    std::env::var(key).map_err(|_| format!("{key} must be set").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fetch_relay=info")),
        )
        .init();

    let mut config = Config::default();
    config.transport.bot_token = required_env("TELEGRAM_BOT_TOKEN")?;
    if let Ok(url) = std::env::var("ARIA2_RPC_URL") {
        config.engine.rpc_url = url;
    }
    config.engine.secret = std::env::var("ARIA2_SECRET").ok();
    if let Ok(dir) = std::env::var("RELAY_STORAGE_DIR") {
        config.relay.storage_dir = dir.into();
    }
    let chat = ChatRef(required_env("RELAY_CHAT_ID")?.parse()?);
    let user = UserRef(
        std::env::var("RELAY_USER_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
    );

    let engine = Arc::new(Aria2Engine::new(&config.engine)?);
    let version = engine.version().await?;
    tracing::info!(version = %version, "Connected to aria2");

    let transport = Arc::new(TelegramTransport::new(&config.transport)?);
    let relay = Relay::new(config, engine, transport).await?;

    let mut events = relay.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Submitted { id, locator } => println!("+ job {id}: {locator}"),
                Event::StateChanged { id, state } => println!("  job {id}: {}", state.label()),
                Event::Finished { id, state, error } => match error {
                    Some(error) => println!("x job {id}: {} ({error})", state.label()),
                    None => println!("= job {id}: {}", state.label()),
                },
                Event::Shutdown => println!("relay stopped"),
            }
        }
    });

    for locator in std::env::args().skip(1) {
        match relay.submit_job(&locator, chat, user).await {
            Ok(id) => tracing::info!(job_id = id.0, "Queued"),
            Err(e) => tracing::error!(locator = %locator, error = %e, "Rejected"),
        }
    }

    run_with_shutdown(relay).await?;
    Ok(())
}
