//! Task lifecycle model (§4.6): modes, states, and per-task counters.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use linkage_core::Error;

use crate::progress::{EtaTracker, Progress};

/// The three execution modes (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
    /// PRIMARY records with no existing `LinkageResult`.
    Incremental,
    /// All PRIMARY records; existing results are overwritten.
    Update,
    /// All PRIMARY records after `clear_all()`.
    Full,
}

impl TaskMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Update => "update",
            Self::Full => "full",
        }
    }

    /// Parse a mode string, rejecting anything but the three known modes
    /// (§7 contract errors).
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "incremental" => Ok(Self::Incremental),
            "update" => Ok(Self::Update),
            "full" => Ok(Self::Full),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

/// Task lifecycle states: `running -> {completed, error, stopped}` (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
    Error,
    Stopped,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Per-task state (§4.6): counters, cursor, and cancellation flag. Shared
/// between the coordinator running the task and any caller polling
/// progress or requesting cancellation.
pub struct TaskState {
    pub task_id: String,
    pub mode: TaskMode,
    pub started_at: DateTime<Utc>,
    start_instant: Instant,

    status: Mutex<TaskStatus>,
    error_message: Mutex<Option<String>>,

    total: AtomicU64,
    processed: AtomicU64,
    matched: AtomicU64,
    updated: AtomicU64,
    skipped: AtomicU64,
    errored: AtomicU64,
    current_batch_index: AtomicU64,

    last_processed_primary_id: Mutex<Option<String>>,
    eta: Mutex<EtaTracker>,
    cancel: AtomicBool,
}

impl TaskState {
    #[must_use]
    pub fn new(task_id: String, mode: TaskMode, total: u64) -> Self {
        Self {
            task_id,
            mode,
            started_at: Utc::now(),
            start_instant: Instant::now(),
            status: Mutex::new(TaskStatus::Running),
            error_message: Mutex::new(None),
            total: AtomicU64::new(total),
            processed: AtomicU64::new(0),
            matched: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            errored: AtomicU64::new(0),
            current_batch_index: AtomicU64::new(0),
            last_processed_primary_id: Mutex::new(None),
            eta: Mutex::new(EtaTracker::default()),
            cancel: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn status(&self) -> TaskStatus {
        *self.status.lock().expect("task status lock poisoned")
    }

    pub fn set_status(&self, status: TaskStatus) {
        *self.status.lock().expect("task status lock poisoned") = status;
    }

    pub fn set_error(&self, message: impl Into<String>) {
        *self.error_message.lock().expect("error message lock poisoned") = Some(message.into());
        self.set_status(TaskStatus::Error);
    }

    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error_message.lock().expect("error message lock poisoned").clone()
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn record_processed(&self, elapsed: std::time::Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.eta.lock().expect("eta lock poisoned").record(elapsed);
    }

    pub fn record_matched(&self) {
        self.matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_updated(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_errored(&self) {
        self.errored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn advance_batch(&self) {
        self.current_batch_index.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_last_processed_primary_id(&self, id: String) {
        *self
            .last_processed_primary_id
            .lock()
            .expect("cursor lock poisoned") = Some(id);
    }

    #[must_use]
    pub fn last_processed_primary_id(&self) -> Option<String> {
        self.last_processed_primary_id
            .lock()
            .expect("cursor lock poisoned")
            .clone()
    }

    #[must_use]
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Snapshot the externally visible progress record (§4.6).
    #[must_use]
    pub fn progress(&self) -> Progress {
        let total = self.total.load(Ordering::Relaxed);
        let processed = self.processed.load(Ordering::Relaxed);
        let matched = self.matched.load(Ordering::Relaxed);
        let elapsed_seconds = self.start_instant.elapsed().as_secs_f64();
        let progress_percent = if total == 0 {
            100.0
        } else {
            (processed as f64 / total as f64 * 100.0).min(100.0)
        };
        let match_rate = if processed == 0 {
            0.0
        } else {
            matched as f64 / processed as f64
        };
        let estimated_remaining_seconds = self.eta.lock().expect("eta lock poisoned").mean().map(|mean| {
            let remaining = total.saturating_sub(processed) as f64;
            remaining * mean.as_secs_f64()
        });
        Progress {
            task_id: self.task_id.clone(),
            status: self.status().as_str().to_string(),
            progress_percent,
            total,
            processed,
            matched,
            updated: self.updated.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
            match_rate,
            elapsed_seconds,
            estimated_remaining_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_unknown_mode() {
        assert!(matches!(TaskMode::parse("bogus"), Err(Error::InvalidMode(_))));
        assert_eq!(TaskMode::parse("incremental").unwrap(), TaskMode::Incremental);
    }

    #[test]
    fn progress_percent_caps_at_total() {
        let state = TaskState::new("T1".into(), TaskMode::Full, 10);
        for _ in 0..10 {
            state.record_processed(std::time::Duration::from_millis(1));
        }
        let p = state.progress();
        assert!((p.progress_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_total_is_already_complete() {
        let state = TaskState::new("T1".into(), TaskMode::Incremental, 0);
        assert!((state.progress().progress_percent - 100.0).abs() < 1e-9);
    }
}
