//! # Scheduler Module
//!
//! Registers background tasks with an external scheduler backend.
//!
//! Tasks are declared in code and collected in a [`TaskCatalog`] under
//! `<module>.<name>`. The configuration then names which of them to enable:
//!
//! ```rust
//! use gantry::scheduler::{
//!     MemoryScheduler, SchedulerAdapter, SchedulerConfig, Task, TaskCatalog, Trigger,
//! };
//! use std::sync::Arc;
//!
//! let catalog = TaskCatalog::new().with(
//!     "jobs.maintenance",
//!     "cleanup",
//!     Task::new(|_, _| Ok(())).id("cleanup").trigger(Trigger::every(60)),
//! );
//! let config = SchedulerConfig::default().task("cleanup", "jobs.maintenance");
//!
//! let backend = Arc::new(MemoryScheduler::new());
//! let adapter = SchedulerAdapter::new(&config, &catalog, backend.clone()).unwrap();
//! assert_eq!(adapter.registered_tasks(), ["jobs.maintenance.cleanup"]);
//! assert_eq!(backend.task_ids(), ["cleanup"]);
//! ```
//!
//! Disabled tasks are skipped. An unknown task or a backend refusal fails
//! startup with a [`ConfigError`](crate::error::ConfigError).

mod adapter;
mod memory;
mod task;

pub use adapter::{
    Scheduler, SchedulerAdapter, SchedulerConfig, SchedulerOptions, TaskCatalog, DEFAULT_TIMEZONE,
};
pub use memory::MemoryScheduler;
pub use task::{scheduled, Task, TaskFn, TaskRegistration, Trigger};
