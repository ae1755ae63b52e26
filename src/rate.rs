//! Throughput estimation and bandwidth formatting
//!
//! [`RateTracker`] turns periodic `(bytes, elapsed)` samples into a smoothed
//! bytes-per-second figure. It keeps an exponentially weighted moving average
//! so a single stalled interval does not drop the reported rate to zero, and a
//! burst does not dominate it either.

use std::time::Duration;

/// Samples closer together than this leave the estimate unchanged
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

/// Smoothed throughput estimate fed by byte-count deltas
///
/// # Examples
///
/// ```
/// use bili_dl_core::rate::RateTracker;
/// use std::time::Duration;
///
/// let mut tracker = RateTracker::new(1.0);
/// assert_eq!(tracker.sample(2048, Duration::from_secs(2)), 1024);
/// ```
#[derive(Clone, Debug)]
pub struct RateTracker {
    /// Weight of the newest sample, in (0, 1]
    smoothing: f64,
    /// Current estimate in bytes per second (None until the first usable sample)
    rate: Option<f64>,
}

impl RateTracker {
    /// Create a tracker; `smoothing` is clamped into (0, 1]
    #[must_use]
    pub fn new(smoothing: f64) -> Self {
        let smoothing = if smoothing.is_finite() && smoothing > 0.0 {
            smoothing.min(1.0)
        } else {
            1.0
        };
        Self {
            smoothing,
            rate: None,
        }
    }

    /// Record `bytes` transferred over `elapsed` and return the current rate
    ///
    /// An `elapsed` below [`MIN_SAMPLE_INTERVAL`] is ignored and the previous
    /// rate is returned.
    pub fn sample(&mut self, bytes: u64, elapsed: Duration) -> u64 {
        if elapsed < MIN_SAMPLE_INTERVAL {
            return self.current_bps();
        }
        let instant = bytes as f64 / elapsed.as_secs_f64();
        let next = match self.rate {
            None => instant,
            Some(prev) => self.smoothing * instant + (1.0 - self.smoothing) * prev,
        };
        self.rate = Some(next);
        self.current_bps()
    }

    /// Current estimate without recording a sample
    pub fn current_bps(&self) -> u64 {
        self.rate.map(|r| r.round() as u64).unwrap_or(0)
    }

    /// Forget all samples
    pub fn reset(&mut self) {
        self.rate = None;
    }
}

/// Format a byte rate for display
///
/// Below 1024 the unit is `Byte/s`, below 1024² it is `KB/s`, otherwise
/// `MB/s`; always one decimal place.
///
/// ```
/// use bili_dl_core::rate::format_bps;
///
/// assert_eq!(format_bps(0), "0.0 Byte/s");
/// assert_eq!(format_bps(1536), "1.5 KB/s");
/// assert_eq!(format_bps(2_097_152), "2.0 MB/s");
/// ```
pub fn format_bps(bps: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bps < KB {
        format!("{:.1} Byte/s", bps as f64)
    } else if bps < MB {
        format!("{:.1} KB/s", bps as f64 / KB as f64)
    } else {
        format!("{:.1} MB/s", bps as f64 / MB as f64)
    }
}
