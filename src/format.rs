//! Human-readable sizes, durations and the status message layout

use std::time::Duration;

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

/// Number of cells in the progress bar
const BAR_CELLS: usize = 10;

/// Format a byte count with binary units, up to two decimals
///
/// ```
/// use fetch_relay::format::readable_size;
///
/// assert_eq!(readable_size(0), "0 B");
/// assert_eq!(readable_size(1536), "1.5 KB");
/// assert_eq!(readable_size(3 * 1024 * 1024 * 1024), "3 GB");
/// ```
pub fn readable_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", trim_decimals(value), SIZE_UNITS[unit])
}

fn trim_decimals(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Format a duration as `1d 2h 3m 4s`, omitting leading zero components
///
/// ```
/// use fetch_relay::format::readable_duration;
/// use std::time::Duration;
///
/// assert_eq!(readable_duration(Duration::from_secs(0)), "0s");
/// assert_eq!(readable_duration(Duration::from_secs(3725)), "1h 2m 5s");
/// ```
pub fn readable_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    if hours > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    out.push_str(&format!("{seconds}s"));
    out
}

/// Fixed-width bar, one filled cell per started ten percent completed
pub fn progress_bar(percent: f64) -> String {
    let clamped = if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    };
    let filled = ((clamped / 10.0).floor() as usize).min(BAR_CELLS);
    format!("[{}{}]", "▪".repeat(filled), "▫".repeat(BAR_CELLS - filled))
}

/// One progress sample to render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Bytes done
    pub done: u64,
    /// Bytes total (0 when unknown)
    pub total: u64,
    /// Current rate in bytes per second
    pub rate: u64,
}

impl ProgressSample {
    /// Percentage complete, 0 when the total is unknown
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.done as f64 / self.total as f64 * 100.0).min(100.0)
    }

    /// Estimated time remaining, None when stalled or the total is unknown
    pub fn eta(&self) -> Option<Duration> {
        if self.rate == 0 || self.total == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.done);
        Some(Duration::from_secs(remaining / self.rate))
    }
}

/// Render the body of a progress status message
///
/// `headline` names the phase ("Downloading", "Uploading part 2/3", ...).
pub fn render_progress(headline: &str, sample: ProgressSample, elapsed: Duration) -> String {
    let percent = sample.percent();
    let eta = sample
        .eta()
        .map(readable_duration)
        .unwrap_or_else(|| "-".to_string());
    let total = if sample.total == 0 {
        "?".to_string()
    } else {
        readable_size(sample.total)
    };

    format!(
        "{headline}: {percent:.2}%\n{bar}\n{done} of {total}\nSpeed: {speed}/sec\nETA: {eta}\nElapsed: {elapsed}",
        bar = progress_bar(percent),
        done = readable_size(sample.done),
        speed = readable_size(sample.rate),
        elapsed = readable_duration(elapsed),
    )
}

/// Final message for a delivered job
pub fn render_success(file_name: &str, parts: usize, size: u64, elapsed: Duration) -> String {
    let parts_note = if parts > 1 {
        format!(" in {parts} parts")
    } else {
        String::new()
    };
    format!(
        "✅ Uploaded {file_name} ({size}){parts_note}\nTook {elapsed}",
        size = readable_size(size),
        elapsed = readable_duration(elapsed),
    )
}

/// Final message for a failed job
pub fn render_failure(reason: &str, elapsed: Duration) -> String {
    format!("❌ {reason}\nAfter {}", readable_duration(elapsed))
}

/// Final message for a cancelled job
pub fn render_cancelled(elapsed: Duration) -> String {
    format!("🚫 Cancelled after {}", readable_duration(elapsed))
}
