use lineage_core::warn;
use std::time::{Duration, Instant};

/// Logs a warning when dropped after running longer than its threshold
pub struct Stopwatch {
    operation: &'static str,
    threshold: Duration,
    started: Instant,
}

impl Stopwatch {
    pub const DEFAULT_THRESHOLD: Duration = Duration::from_secs(1);

    pub fn start(operation: &'static str) -> Self {
        Self::with_threshold(operation, Self::DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(operation: &'static str, threshold: Duration) -> Self {
        Self { operation, threshold, started: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn exceeded(&self) -> bool {
        self.elapsed() > self.threshold
    }
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        if self.exceeded() {
            warn!("{} took {:.3?} (threshold {:?})", self.operation, self.elapsed(), self.threshold);
        }
    }
}
