//! Error taxonomy.
//!
//! Three families of failure exist and they are handled very differently:
//!
//! - [`ConfigError`] - raised while the application is being assembled. These are
//!   fatal to boot and are never deferred to request time.
//! - [`SchemaError`] - raised while the OpenAPI document is being assembled. The
//!   schema endpoint turns them into a 500 response; the process keeps serving.
//! - [`SchedulerError`] - raised by a [`Scheduler`](crate::scheduler::Scheduler)
//!   backend. During startup they are wrapped into [`ConfigError::Scheduler`].
//!
//! Per-request input failures are not errors in this sense: they are collected
//! as [`ErrorDetail`](crate::params::ErrorDetail) values and rendered as a 422.

use crate::validator::{format_issues, ValidationIssue};
use std::path::PathBuf;
use thiserror::Error;

/// Application assembly failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more routes declare ambiguous or unresolvable inputs.
    #[error("invalid application configuration ({} issue(s)):\n{}", .0.len(), format_issues(.0))]
    Invalid(Vec<ValidationIssue>),

    /// A configuration file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be parsed.
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// A scheduled task could not be registered with the scheduler backend.
    #[error("scheduler task `{task}` could not be registered: {source}")]
    Scheduler {
        task: String,
        #[source]
        source: SchedulerError,
    },
}

impl ConfigError {
    /// Issues carried by an [`ConfigError::Invalid`] error, empty otherwise.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            ConfigError::Invalid(issues) => issues,
            _ => &[],
        }
    }
}

/// Failure to turn route metadata into an OpenAPI document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A field or parameter uses a type with no JSON Schema representation.
    #[error("`{context}` has type `{type_name}`, which cannot be expressed as JSON Schema")]
    OpaqueType { context: String, type_name: String },

    /// An inline schema was supplied but is not a JSON object.
    #[error("`{context}` declares an inline schema that is not a JSON object")]
    InvalidInlineSchema { context: String },

    /// Two different model definitions were registered under one name.
    #[error("two different models share the name `{0}`")]
    ConflictingModel(String),

    /// Two different security schemes were registered under one identifier.
    #[error("two different security schemes share the identifier `{0}`")]
    ConflictingSecurityScheme(String),

    /// The document could not be serialized.
    #[error("schema serialization failed: {0}")]
    Serialization(String),
}

/// Failure reported by a scheduler backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("task `{0}` is not present in the task catalog")]
    UnknownTask(String),

    #[error("task declaration `{0}` must name both a task and a module")]
    InvalidDeclaration(String),

    #[error("a task with id `{0}` already exists")]
    DuplicateId(String),

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("scheduler is not running")]
    NotRunning,

    #[error("task `{id}` failed: {message}")]
    TaskFailed { id: String, message: String },

    #[error("scheduler backend failure: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_lists_every_issue() {
        let err = ConfigError::Invalid(vec![
            ValidationIssue::new("GET /a", "AmbiguousParameter", "x declared twice"),
            ValidationIssue::new("GET /b", "UnresolvedDependency", "y is unknown"),
        ]);
        let text = err.to_string();
        assert!(text.contains("2 issue(s)"));
        assert!(text.contains("[AmbiguousParameter] GET /a: x declared twice"));
        assert!(text.contains("[UnresolvedDependency] GET /b: y is unknown"));
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn scheduler_error_is_wrapped_as_config_error() {
        let err = ConfigError::Scheduler {
            task: "jobs.cleanup".to_string(),
            source: SchedulerError::DuplicateId("cleanup".to_string()),
        };
        assert!(err.to_string().contains("jobs.cleanup"));
        assert!(err.issues().is_empty());
    }
}
