//! Per-job throttle for status message edits
//!
//! Every job owns its own [`ProgressThrottle`], so one busy job can never
//! starve another job's progress updates. Final state transitions bypass the
//! throttle entirely; only intermediate progress goes through it.

use std::time::Duration;
use tokio::time::Instant;

/// Gate that lets at most one progress edit through per window
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    next_allowed: Option<Instant>,
}

impl ProgressThrottle {
    /// Create a throttle with the given minimum spacing between edits
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: None,
        }
    }

    /// Whether an edit would be allowed right now
    pub fn is_ready(&self) -> bool {
        self.next_allowed
            .is_none_or(|next| Instant::now() >= next)
    }

    /// Claim the current window; returns false if an edit already went out in it
    pub fn try_acquire(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.next_allowed = Some(Instant::now() + self.interval);
        true
    }

    /// Push the next allowed edit out by at least `backoff` from now
    ///
    /// Used when the platform rate-limits a progress edit.
    pub fn defer(&mut self, backoff: Duration) {
        let candidate = Instant::now() + backoff;
        self.next_allowed = Some(match self.next_allowed {
            Some(next) if next > candidate => next,
            _ => candidate,
        });
    }
}
