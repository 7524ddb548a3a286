//! Startup issue collection.
//!
//! Every route is inspected before the application is allowed to serve traffic.
//! Problems are gathered as [`ValidationIssue`]s so that one boot attempt reports
//! all of them at once instead of failing on the first.

use crate::error::ConfigError;
use std::fmt;
use tracing::error;

/// A single configuration problem found while assembling the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Where the problem was found, e.g. `GET /items/{id}`
    pub location: String,
    /// Machine-readable category, e.g. `AmbiguousParameter`
    pub kind: String,
    /// Human-readable explanation
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Render issues one per line, indented.
pub fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turn a non-empty issue list into a boot failure.
///
/// Each issue is also logged so that the failure is visible even when the
/// caller only reports the top-level error.
pub fn fail_if_issues(issues: Vec<ValidationIssue>) -> Result<(), ConfigError> {
    if issues.is_empty() {
        return Ok(());
    }
    for issue in &issues {
        error!(
            kind = %issue.kind,
            location = %issue.location,
            message = %issue.message,
            "Configuration issue"
        );
    }
    Err(ConfigError::Invalid(issues))
}
