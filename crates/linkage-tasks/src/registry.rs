//! Task registry (§9 Design Notes): an explicitly-owned registry of
//! active and completed tasks for one PRIMARY source, not ambient global
//! state. Its lifecycle is tied to whatever owns it (typically the
//! process); on restart, any task it remembers as `running` is recovered
//! via [`TaskRegistry::recover_on_startup`], which marks it `error` unless
//! the caller explicitly resumes the same `task_id` (§4.6 step 6).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use linkage_core::{Error, Result};

use crate::progress::Progress;
use crate::task::{TaskMode, TaskState, TaskStatus};

/// Registry of tasks for a single PRIMARY source. At most one task may be
/// `running` at a time (§4.6 concurrency budget).
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, Arc<TaskState>>>,
    running_task_id: Mutex<Option<String>>,
}

impl TaskRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly started task, claiming the single concurrency
    /// slot. Fails with `TASK_ALREADY_RUNNING` if one is already active.
    pub fn register(&self, task_id: String, mode: TaskMode, total: u64) -> Result<Arc<TaskState>> {
        let mut running = self.running_task_id.lock().expect("running slot lock poisoned");
        if running.is_some() {
            return Err(Error::TaskAlreadyRunning);
        }
        let state = Arc::new(TaskState::new(task_id.clone(), mode, total));
        *running = Some(task_id.clone());
        self.tasks
            .lock()
            .expect("tasks map lock poisoned")
            .insert(task_id, state.clone());
        Ok(state)
    }

    /// Release the concurrency slot once a task reaches a terminal state.
    /// Idempotent: a second call for the same (or any) task id is a no-op
    /// once the slot has already been released.
    pub fn release_slot_for(&self, task_id: &str) {
        let mut running = self.running_task_id.lock().expect("running slot lock poisoned");
        if running.as_deref() == Some(task_id) {
            *running = None;
        }
    }

    #[must_use]
    pub fn get(&self, task_id: &str) -> Option<Arc<TaskState>> {
        self.tasks.lock().expect("tasks map lock poisoned").get(task_id).cloned()
    }

    pub fn progress(&self, task_id: &str) -> Result<Progress> {
        self.get(task_id)
            .map(|state| state.progress())
            .ok_or_else(|| Error::UnknownTask(task_id.to_string()))
    }

    /// Request cancellation of a running task (§4.6 step 5).
    pub fn stop(&self, task_id: &str) -> Result<()> {
        let state = self
            .get(task_id)
            .ok_or_else(|| Error::UnknownTask(task_id.to_string()))?;
        if state.status() != TaskStatus::Running {
            return Err(Error::TaskNotRunning(task_id.to_string()));
        }
        state.request_cancel();
        Ok(())
    }

    /// Mark every task this registry still remembers as `running` as
    /// `error`, since the process restarted without completing them and
    /// no resumption was requested (§4.6 step 6, §9).
    pub fn recover_on_startup(&self) {
        let mut running = self.running_task_id.lock().expect("running slot lock poisoned");
        for state in self.tasks.lock().expect("tasks map lock poisoned").values() {
            if state.status() == TaskStatus::Running {
                state.set_error("process restarted mid-task without resumption");
            }
        }
        *running = None;
    }

    #[must_use]
    pub fn is_task_running(&self) -> bool {
        self.running_task_id.lock().expect("running slot lock poisoned").is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_second_concurrent_task() {
        let registry = TaskRegistry::new();
        registry.register("T1".into(), TaskMode::Full, 10).unwrap();
        let err = registry.register("T2".into(), TaskMode::Full, 10).unwrap_err();
        assert!(matches!(err, Error::TaskAlreadyRunning));
    }

    #[test]
    fn releasing_slot_allows_next_task() {
        let registry = TaskRegistry::new();
        registry.register("T1".into(), TaskMode::Full, 10).unwrap();
        registry.release_slot_for("T1");
        assert!(registry.register("T2".into(), TaskMode::Full, 10).is_ok());
    }

    #[test]
    fn stop_rejects_unknown_and_non_running_tasks() {
        let registry = TaskRegistry::new();
        assert!(matches!(registry.stop("ghost"), Err(Error::UnknownTask(_))));
        let state = registry.register("T1".into(), TaskMode::Full, 10).unwrap();
        state.set_status(TaskStatus::Completed);
        assert!(matches!(registry.stop("T1"), Err(Error::TaskNotRunning(_))));
    }

    #[test]
    fn recover_on_startup_errors_out_running_tasks() {
        let registry = TaskRegistry::new();
        let state = registry.register("T1".into(), TaskMode::Full, 10).unwrap();
        registry.recover_on_startup();
        assert_eq!(state.status(), TaskStatus::Error);
        assert!(!registry.is_task_running());
    }
}
