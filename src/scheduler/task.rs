use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// The callable a task runs: positional args, then keyword args.
pub type TaskFn = Arc<dyn Fn(&[Value], &IndexMap<String, Value>) -> anyhow::Result<()> + Send + Sync>;

/// When a task fires. Interpretation belongs to the scheduler backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Interval { seconds: u64 },
    Cron { expression: String },
    Date { run_at: SystemTime },
    /// Backend-specific trigger description, passed through untouched.
    Custom(Value),
}

impl Trigger {
    pub fn every(seconds: u64) -> Self {
        Trigger::Interval { seconds }
    }

    pub fn cron(expression: impl Into<String>) -> Self {
        Trigger::Cron {
            expression: expression.into(),
        }
    }
}

/// A schedulable unit of work plus the options it is registered with.
///
/// `replace_existing` defaults to `false` here and to `true` when built
/// through [`scheduled`].
#[derive(Clone)]
pub struct Task {
    func: TaskFn,
    name: Option<String>,
    trigger: Option<Trigger>,
    id: Option<String>,
    mistrigger_grace_time: Option<u64>,
    coalesce: Option<bool>,
    max_instances: Option<u32>,
    next_run_time: Option<SystemTime>,
    store: String,
    executor: String,
    replace_existing: bool,
    args: Vec<Value>,
    kwargs: IndexMap<String, Value>,
    is_enabled: bool,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("replace_existing", &self.replace_existing)
            .field("is_enabled", &self.is_enabled)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&[Value], &IndexMap<String, Value>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Task {
            func: Arc::new(func),
            name: None,
            trigger: None,
            id: None,
            mistrigger_grace_time: None,
            coalesce: None,
            max_instances: None,
            next_run_time: None,
            store: "default".to_string(),
            executor: "default".to_string(),
            replace_existing: false,
            args: Vec::new(),
            kwargs: IndexMap::new(),
            is_enabled: true,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Seconds after the designated run time during which a late run is
    /// still allowed.
    #[must_use]
    pub fn mistrigger_grace_time(mut self, seconds: u64) -> Self {
        self.mistrigger_grace_time = Some(seconds);
        self
    }

    /// Collapse a backlog of missed runs into one.
    #[must_use]
    pub fn coalesce(mut self, coalesce: bool) -> Self {
        self.coalesce = Some(coalesce);
        self
    }

    #[must_use]
    pub fn max_instances(mut self, max: u32) -> Self {
        self.max_instances = Some(max);
        self
    }

    #[must_use]
    pub fn next_run_time(mut self, at: SystemTime) -> Self {
        self.next_run_time = Some(at);
        self
    }

    #[must_use]
    pub fn store(mut self, store: impl Into<String>) -> Self {
        self.store = store.into();
        self
    }

    #[must_use]
    pub fn executor(mut self, executor: impl Into<String>) -> Self {
        self.executor = executor.into();
        self
    }

    #[must_use]
    pub fn replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    #[must_use]
    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.is_enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn get_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The payload handed to [`Scheduler::add_task`](super::Scheduler::add_task).
    pub fn registration(&self) -> TaskRegistration {
        TaskRegistration {
            func: Arc::clone(&self.func),
            trigger: self.trigger.clone(),
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
            id: self.id.clone(),
            name: self.name.clone(),
            mistrigger_grace_time: self.mistrigger_grace_time,
            coalesce: self.coalesce,
            max_instances: self.max_instances,
            next_run_time: self.next_run_time,
            store: self.store.clone(),
            executor: self.executor.clone(),
            replace_existing: self.replace_existing,
        }
    }
}

/// Build a task the way the `scheduler` decorator does: identical to
/// [`Task::new`] except that `replace_existing` starts out `true`.
pub fn scheduled<F>(func: F) -> Task
where
    F: Fn(&[Value], &IndexMap<String, Value>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Task::new(func).replace_existing(true)
}

/// Everything a scheduler backend receives for one task.
#[derive(Clone)]
pub struct TaskRegistration {
    pub func: TaskFn,
    pub trigger: Option<Trigger>,
    pub args: Vec<Value>,
    pub kwargs: IndexMap<String, Value>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub mistrigger_grace_time: Option<u64>,
    pub coalesce: Option<bool>,
    pub max_instances: Option<u32>,
    pub next_run_time: Option<SystemTime>,
    pub store: String,
    pub executor: String,
    pub replace_existing: bool,
}

impl fmt::Debug for TaskRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistration")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("store", &self.store)
            .field("executor", &self.executor)
            .field("replace_existing", &self.replace_existing)
            .finish_non_exhaustive()
    }
}

impl TaskRegistration {
    /// Invoke the task function with its declared arguments.
    pub fn run(&self) -> anyhow::Result<()> {
        (self.func)(&self.args, &self.kwargs)
    }
}
