#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Scheduler integration: catalog lookup, backend registration and the
//! application lifecycle.

mod common;

use common::temp_files;
use gantry::error::{ConfigError, SchedulerError};
use gantry::prelude::*;
use gantry::scheduler::{
    scheduled, MemoryScheduler, Scheduler, SchedulerAdapter, SchedulerConfig, Task, TaskCatalog,
    TaskRegistration, Trigger, DEFAULT_TIMEZONE,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn counting_task(counter: &Arc<AtomicUsize>) -> Task {
    let counter = Arc::clone(counter);
    Task::new(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

fn catalog() -> TaskCatalog {
    TaskCatalog::new()
        .with(
            "jobs.maintenance",
            "cleanup",
            Task::new(|_, _| Ok(())).id("cleanup").trigger(Trigger::every(60)),
        )
        .with(
            "jobs.reporting",
            "report",
            Task::new(|_, _| Ok(()))
                .id("report")
                .trigger(Trigger::cron("0 6 * * *")),
        )
        .with(
            "jobs.reporting",
            "legacy",
            Task::new(|_, _| Ok(())).id("legacy").enabled(false),
        )
}

#[test]
fn enabled_tasks_are_registered_and_disabled_ones_skipped() {
    let config = SchedulerConfig::default()
        .task("cleanup", "jobs.maintenance")
        .task("legacy", "jobs.reporting")
        .task("report", "jobs.reporting");
    let backend = Arc::new(MemoryScheduler::new());
    let adapter = SchedulerAdapter::new(&config, &catalog(), Arc::clone(&backend) as Arc<dyn Scheduler>)
        .unwrap();

    assert_eq!(
        adapter.registered_tasks(),
        ["jobs.maintenance.cleanup", "jobs.reporting.report"]
    );
    assert_eq!(backend.task_ids(), ["cleanup", "report"]);
    let report = backend.get("report").unwrap();
    assert_eq!(report.trigger, Some(Trigger::cron("0 6 * * *")));
    assert_eq!(report.store, "default");
    assert_eq!(report.executor, "default");
}

#[test]
fn timezone_defaults_and_configurations_are_forwarded() {
    let backend = Arc::new(MemoryScheduler::new());
    let adapter = SchedulerAdapter::new(
        &SchedulerConfig::default(),
        &TaskCatalog::new(),
        Arc::clone(&backend) as Arc<dyn Scheduler>,
    )
    .unwrap();
    assert_eq!(adapter.options().timezone, DEFAULT_TIMEZONE);
    assert!(adapter.registered_tasks().is_empty());

    let mut config = SchedulerConfig {
        timezone: Some("Europe/Lisbon".to_string()),
        ..SchedulerConfig::default()
    };
    config
        .configurations
        .insert("apscheduler.job_defaults.coalesce".to_string(), json!(false));
    let backend = Arc::new(MemoryScheduler::new());
    SchedulerAdapter::new(&config, &TaskCatalog::new(), Arc::clone(&backend) as Arc<dyn Scheduler>)
        .unwrap();
    let options = backend.options().unwrap();
    assert_eq!(options.timezone, "Europe/Lisbon");
    assert_eq!(options.configurations["apscheduler.job_defaults.coalesce"], false);
}

#[test]
fn unknown_task_fails_with_its_path() {
    let config = SchedulerConfig::default().task("vacuum", "jobs.maintenance");
    let err = SchedulerAdapter::new(&config, &catalog(), Arc::new(MemoryScheduler::new()))
        .unwrap_err();
    match err {
        ConfigError::Scheduler { task, source } => {
            assert_eq!(task, "jobs.maintenance.vacuum");
            assert_eq!(
                source,
                SchedulerError::UnknownTask("jobs.maintenance.vacuum".to_string())
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_declarations_are_rejected() {
    let config = SchedulerConfig::default().task("cleanup", "");
    let err = SchedulerAdapter::new(&config, &catalog(), Arc::new(MemoryScheduler::new()))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Scheduler {
            source: SchedulerError::InvalidDeclaration(_),
            ..
        }
    ));
}

#[test]
fn duplicate_ids_fail_unless_replace_existing() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = SchedulerConfig::default()
        .task("first", "jobs")
        .task("second", "jobs");

    let clashing = TaskCatalog::new()
        .with("jobs", "first", counting_task(&counter).id("sync"))
        .with("jobs", "second", counting_task(&counter).id("sync"));
    let err = SchedulerAdapter::new(&config, &clashing, Arc::new(MemoryScheduler::new()))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Scheduler { ref task, source: SchedulerError::DuplicateId(ref id) }
            if task == "jobs.second" && id == "sync"
    ));

    let replacing = TaskCatalog::new()
        .with("jobs", "first", counting_task(&counter).id("sync"))
        .with(
            "jobs",
            "second",
            scheduled(|_, _| anyhow::bail!("replacement ran")).id("sync"),
        );
    let backend = Arc::new(MemoryScheduler::new());
    SchedulerAdapter::new(&config, &replacing, Arc::clone(&backend) as Arc<dyn Scheduler>).unwrap();
    assert_eq!(backend.task_ids(), ["sync"]);
    let err = backend.run_now("sync").unwrap_err();
    assert!(matches!(err, SchedulerError::TaskFailed { ref message, .. } if message == "replacement ran"));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn tasks_run_with_their_declared_arguments() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let task = Task::new(move |args, kwargs| {
        sink.lock().unwrap().push(json!({ "args": args, "kwargs": kwargs }));
        Ok(())
    })
    .id("greet")
    .args(vec![json!("ada")])
    .kwarg("loud", json!(true));

    let backend = Arc::new(MemoryScheduler::new());
    SchedulerAdapter::new(
        &SchedulerConfig::default().task("greet", "jobs"),
        &TaskCatalog::new().with("jobs", "greet", task),
        Arc::clone(&backend) as Arc<dyn Scheduler>,
    )
    .unwrap();
    backend.run_now("greet").unwrap();
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        [json!({"args": ["ada"], "kwargs": {"loud": true}})]
    );
}

/// Backend that refuses every task.
struct RefusingScheduler;

impl Scheduler for RefusingScheduler {
    fn add_task(&self, task: TaskRegistration) -> Result<(), SchedulerError> {
        Err(SchedulerError::Backend(format!(
            "store unavailable for {}",
            task.id.unwrap_or_default()
        )))
    }

    fn start(&self) -> Result<(), SchedulerError> {
        Ok(())
    }

    fn shutdown(&self) -> Result<(), SchedulerError> {
        Ok(())
    }
}

#[test]
fn backend_refusal_fails_the_app_build() {
    let mut config = AppConfig::default();
    config.scheduler = Some(SchedulerConfig::default().task("cleanup", "jobs.maintenance"));
    let err = AppBuilder::new(config)
        .scheduler(catalog(), Arc::new(RefusingScheduler))
        .build()
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("jobs.maintenance.cleanup"), "{message}");
}

#[test]
fn app_lifecycle_drives_the_backend() {
    let mut config = AppConfig::default();
    config.scheduler = Some(SchedulerConfig::default().task("cleanup", "jobs.maintenance"));
    let backend = Arc::new(MemoryScheduler::new());
    let app = AppBuilder::new(config)
        .scheduler(catalog(), Arc::clone(&backend) as Arc<dyn Scheduler>)
        .build()
        .unwrap();

    assert_eq!(
        app.scheduler().unwrap().registered_tasks(),
        ["jobs.maintenance.cleanup"]
    );
    assert!(!backend.is_running());
    app.startup().unwrap();
    assert!(backend.is_running());
    assert_eq!(app.startup(), Err(SchedulerError::AlreadyRunning));
    app.shutdown().unwrap();
    assert!(!backend.is_running());
    assert_eq!(app.shutdown(), Err(SchedulerError::NotRunning));
}

#[test]
fn app_without_scheduler_section_has_no_scheduler() {
    let app = AppBuilder::new(AppConfig::default())
        .tasks(catalog())
        .build()
        .unwrap();
    assert!(app.scheduler().is_none());
    app.startup().unwrap();
    app.shutdown().unwrap();
}

#[test]
fn scheduler_section_loads_from_yaml() {
    let file = temp_files::with_extension(
        r#"
title: Jobs
version: 1.0.0
scheduler:
  timezone: Europe/Lisbon
  tasks:
    cleanup: jobs.maintenance
    report: jobs.reporting
"#,
        "yaml",
    );
    let config = AppConfig::from_file(file.path()).unwrap();
    let app = AppBuilder::new(config).tasks(catalog()).build().unwrap();
    let scheduler = app.scheduler().unwrap();
    assert_eq!(scheduler.options().timezone, "Europe/Lisbon");
    assert_eq!(
        scheduler.registered_tasks(),
        ["jobs.maintenance.cleanup", "jobs.reporting.report"]
    );
}
