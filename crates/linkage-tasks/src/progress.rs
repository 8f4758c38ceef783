//! Progress reporting (§4.6): a moving average of per-record elapsed time
//! over the last 1 000 records, used to estimate remaining time.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const WINDOW: usize = 1_000;

/// Ring buffer of recent per-record durations.
#[derive(Debug, Default)]
pub struct EtaTracker {
    samples: VecDeque<Duration>,
    sum: Duration,
}

impl EtaTracker {
    pub fn record(&mut self, elapsed: Duration) {
        self.samples.push_back(elapsed);
        self.sum += elapsed;
        if self.samples.len() > WINDOW {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
    }

    /// Mean per-record duration over the window, or `None` if empty.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.sum / self.samples.len() as u32)
        }
    }
}

/// `{status, progress_percent, processed, matched, match_rate,
/// elapsed_seconds, estimated_remaining_seconds}` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub task_id: String,
    pub status: String,
    pub progress_percent: f64,
    pub total: u64,
    pub processed: u64,
    pub matched: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errored: u64,
    pub match_rate: f64,
    pub elapsed_seconds: f64,
    pub estimated_remaining_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_tracks_bounded_window() {
        let mut tracker = EtaTracker::default();
        for _ in 0..1_500 {
            tracker.record(Duration::from_millis(10));
        }
        assert_eq!(tracker.mean(), Some(Duration::from_millis(10)));

        let mut tracker = EtaTracker::default();
        tracker.record(Duration::from_millis(10));
        tracker.record(Duration::from_millis(30));
        assert_eq!(tracker.mean(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn empty_tracker_has_no_mean() {
        assert_eq!(EtaTracker::default().mean(), None);
    }
}
