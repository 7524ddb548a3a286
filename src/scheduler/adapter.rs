use super::task::{Task, TaskRegistration};
use crate::error::{ConfigError, SchedulerError};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Timezone used when the configuration does not name one.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Options forwarded to the backend before any task is registered.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerOptions {
    pub timezone: String,
    /// Backend-specific settings, passed through untouched.
    pub configurations: IndexMap<String, Value>,
}

/// The seam to a scheduler backend.
///
/// Trigger evaluation and execution are the backend's business; gantry only
/// registers tasks and forwards lifecycle calls.
pub trait Scheduler: Send + Sync {
    fn configure(&self, _options: &SchedulerOptions) -> Result<(), SchedulerError> {
        Ok(())
    }

    fn add_task(&self, task: TaskRegistration) -> Result<(), SchedulerError>;

    fn start(&self) -> Result<(), SchedulerError>;

    fn shutdown(&self) -> Result<(), SchedulerError>;
}

/// Scheduler section of the application configuration.
///
/// ```yaml
/// scheduler:
///   timezone: Europe/Lisbon
///   tasks:
///     cleanup: jobs.maintenance
///     report: jobs.reporting
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Task name to module path; `<module>.<name>` is looked up in the catalog.
    pub tasks: IndexMap<String, String>,
    pub timezone: Option<String>,
    pub configurations: IndexMap<String, Value>,
}

impl SchedulerConfig {
    pub fn task(mut self, name: impl Into<String>, module: impl Into<String>) -> Self {
        self.tasks.insert(name.into(), module.into());
        self
    }

    pub fn options(&self) -> SchedulerOptions {
        SchedulerOptions {
            timezone: self
                .timezone
                .clone()
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            configurations: self.configurations.clone(),
        }
    }
}

/// Tasks addressable by `<module>.<name>`.
#[derive(Debug, Clone, Default)]
pub struct TaskCatalog {
    tasks: IndexMap<String, Task>,
}

impl TaskCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: &str, name: &str, task: Task) {
        self.tasks.insert(format!("{module}.{name}"), task);
    }

    #[must_use]
    pub fn with(mut self, module: &str, name: &str, task: Task) -> Self {
        self.register(module, name, task);
        self
    }

    pub fn get(&self, path: &str) -> Option<&Task> {
        self.tasks.get(path)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Registers the configured tasks with a backend and proxies its lifecycle.
pub struct SchedulerAdapter {
    scheduler: Arc<dyn Scheduler>,
    options: SchedulerOptions,
    registered: Vec<String>,
}

impl std::fmt::Debug for SchedulerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerAdapter")
            .field("options", &self.options)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

impl SchedulerAdapter {
    /// Configure `scheduler` and register every enabled task in `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Scheduler`] for the first declaration that is empty,
    /// missing from `catalog`, or refused by the backend.
    pub fn new(
        config: &SchedulerConfig,
        catalog: &TaskCatalog,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, ConfigError> {
        if config.tasks.is_empty() {
            warn!("Scheduler is starting, yet there are no tasks declared");
        }

        let options = config.options();
        scheduler
            .configure(&options)
            .map_err(|source| ConfigError::Scheduler {
                task: "<configure>".to_string(),
                source,
            })?;

        let mut registered = Vec::new();
        for (name, module) in &config.tasks {
            let path = format!("{module}.{name}");
            if name.trim().is_empty() || module.trim().is_empty() {
                return Err(ConfigError::Scheduler {
                    task: path.clone(),
                    source: SchedulerError::InvalidDeclaration(path),
                });
            }
            let task = catalog.get(&path).ok_or_else(|| ConfigError::Scheduler {
                task: path.clone(),
                source: SchedulerError::UnknownTask(path.clone()),
            })?;
            if !task.is_enabled() {
                debug!(task = %path, "Skipping disabled task");
                continue;
            }
            scheduler
                .add_task(task.registration())
                .map_err(|source| ConfigError::Scheduler {
                    task: path.clone(),
                    source,
                })?;
            info!(task = %path, id = ?task.get_id(), "Task registered");
            registered.push(path);
        }

        info!(
            timezone = %options.timezone,
            task_count = registered.len(),
            "Scheduler configured"
        );
        Ok(SchedulerAdapter {
            scheduler,
            options,
            registered,
        })
    }

    pub fn start(&self) -> Result<(), SchedulerError> {
        self.scheduler.start()?;
        info!("Scheduler started");
        Ok(())
    }

    pub fn shutdown(&self) -> Result<(), SchedulerError> {
        self.scheduler.shutdown()?;
        info!("Scheduler stopped");
        Ok(())
    }

    /// `<module>.<name>` of every task handed to the backend, in order.
    pub fn registered_tasks(&self) -> &[String] {
        &self.registered
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }
}
