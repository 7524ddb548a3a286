use super::adapter::{Scheduler, SchedulerOptions};
use super::task::TaskRegistration;
use crate::error::SchedulerError;
use indexmap::IndexMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct State {
    tasks: IndexMap<String, TaskRegistration>,
    running: bool,
    options: Option<SchedulerOptions>,
}

/// In-process [`Scheduler`] that only stores registrations.
///
/// Nothing fires on its own; [`run_now`](Self::run_now) invokes a task on
/// demand. Useful for tests and for applications that drive tasks manually.
#[derive(Debug, Default)]
pub struct MemoryScheduler {
    state: Mutex<State>,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.state().tasks.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<TaskRegistration> {
        self.state().tasks.get(id).cloned()
    }

    pub fn options(&self) -> Option<SchedulerOptions> {
        self.state().options.clone()
    }

    /// Run the task stored under `id` on the calling thread.
    pub fn run_now(&self, id: &str) -> Result<(), SchedulerError> {
        let task = self
            .get(id)
            .ok_or_else(|| SchedulerError::UnknownTask(id.to_string()))?;
        task.run().map_err(|e| {
            warn!(task_id = %id, error = %e, "Task failed");
            SchedulerError::TaskFailed {
                id: id.to_string(),
                message: e.to_string(),
            }
        })
    }
}

impl Scheduler for MemoryScheduler {
    fn configure(&self, options: &SchedulerOptions) -> Result<(), SchedulerError> {
        self.state().options = Some(options.clone());
        Ok(())
    }

    /// Store the task under its id, generating a ULID when none was given.
    fn add_task(&self, task: TaskRegistration) -> Result<(), SchedulerError> {
        let id = task
            .id
            .clone()
            .unwrap_or_else(|| ulid::Ulid::new().to_string());
        let mut state = self.state();
        if state.tasks.contains_key(&id) && !task.replace_existing {
            return Err(SchedulerError::DuplicateId(id));
        }
        debug!(task_id = %id, "Task stored");
        state.tasks.insert(id, task);
        Ok(())
    }

    fn start(&self) -> Result<(), SchedulerError> {
        let mut state = self.state();
        if state.running {
            return Err(SchedulerError::AlreadyRunning);
        }
        state.running = true;
        Ok(())
    }

    fn shutdown(&self) -> Result<(), SchedulerError> {
        let mut state = self.state();
        if !state.running {
            return Err(SchedulerError::NotRunning);
        }
        state.running = false;
        Ok(())
    }
}
