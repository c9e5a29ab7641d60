//! Messaging transport abstraction
//!
//! Results are delivered to a chat platform through the [`Transport`] trait:
//! text messages that can be edited in place (the job's status message) and
//! file uploads that report their progress through a [`ProgressSink`].
//!
//! Every operation may fail with
//! [`TransportError::RateLimited`](crate::error::TransportError::RateLimited).
//! That is a backoff signal, not a failure. Callers honor it with
//! [`with_rate_limit`](crate::retry::with_rate_limit).
//!
//! ## Implementations
//!
//! - [`TelegramTransport`]: the Telegram Bot API

mod media;
mod progress;
mod telegram;
mod traits;

pub use media::MediaKind;
pub use progress::ProgressSink;
pub use telegram::TelegramTransport;
pub use traits::{OutgoingFile, Transport};
