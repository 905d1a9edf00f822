use log::info;
use std::time::{Duration, Instant};

/// Number of accepted records between two progress lines.
pub const DEFAULT_UPDATE_INTERVAL: u64 = 100_000;

/// Logs how long each interval of records took to process.
pub struct ProgressTracker {
    interval: u64,
    stopwatch: Instant,
}

impl ProgressTracker {
    /// An interval of 0 disables progress lines.
    pub fn new(interval: u64) -> Self {
        ProgressTracker {
            interval,
            stopwatch: Instant::now(),
        }
    }

    /// Called with the running total after each accepted record. Logs and restarts the interval
    /// timer whenever `total` completes an interval, returning the interval's duration.
    pub fn observe(&mut self, total: u64) -> Option<Duration> {
        if self.interval == 0 || total == 0 || total % self.interval != 0 {
            return None;
        }
        let elapsed = self.stopwatch.elapsed();
        info!(
            "processed {} records of {} in {:?}",
            self.interval, total, elapsed
        );
        self.stopwatch = Instant::now();
        Some(elapsed)
    }
}
