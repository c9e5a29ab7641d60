//! Upload progress reporting

use std::sync::Arc;
use tokio::sync::watch;

/// Write end of an upload progress channel
///
/// Adapters call [`report`](Self::report) with the cumulative number of bytes
/// sent. The reader only ever sees the latest value, so reporting on every
/// chunk is fine; throttling happens on the reading side.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<Arc<watch::Sender<u64>>>,
}

impl ProgressSink {
    /// Create a sink and the receiver that observes it
    pub fn channel() -> (Self, watch::Receiver<u64>) {
        let (tx, rx) = watch::channel(0);
        (Self { tx: Some(Arc::new(tx)) }, rx)
    }

    /// A sink that discards every report
    pub fn noop() -> Self {
        Self { tx: None }
    }

    /// Record the cumulative number of bytes sent so far
    pub fn report(&self, bytes_sent: u64) {
        if let Some(tx) = &self.tx {
            tx.send_replace(bytes_sent);
        }
    }
}
