//! Fetch engine abstraction
//!
//! The relay never talks to a download daemon directly. It goes through the
//! [`FetchEngine`] trait, which models the daemon as four poll-driven
//! operations: submit, poll, list files and cancel.
//!
//! ## Implementations
//!
//! - [`Aria2Engine`]: aria2 over its JSON-RPC interface (magnets, URLs, torrent files)
//!
//! ## Usage
//!
//! ```no_run
//! use fetch_relay::config::EngineConfig;
//! use fetch_relay::engine::{Aria2Engine, FetchEngine};
//! use fetch_relay::types::Locator;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Aria2Engine::new(&EngineConfig::default())?;
//! let locator = Locator::parse("https://example.com/file.iso")?;
//!
//! let handle = engine.submit(&locator, Path::new("./downloads/job_1")).await?;
//! let status = engine.poll(&handle).await?;
//! println!("{:.1}% done", status.percent());
//! # Ok(())
//! # }
//! ```

mod aria2;
mod traits;

pub use aria2::Aria2Engine;
pub use traits::FetchEngine;
