//! # Application Configuration
//!
//! [`AppConfig`] carries the document-level settings of an application: the
//! OpenAPI `info` block, servers, where the schema is served and the optional
//! scheduler section.
//!
//! ## Sources
//!
//! Configuration is layered:
//!
//! 1. Defaults ([`AppConfig::default`])
//! 2. A YAML (`.yaml`/`.yml`) or JSON file ([`AppConfig::from_file`])
//! 3. Environment overrides ([`AppConfig::apply_env`])
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |---|---|
//! | `GANTRY_TITLE` | `title` |
//! | `GANTRY_VERSION` | `version` |
//! | `GANTRY_OPENAPI_URL` | `openapi_url` |
//! | `GANTRY_ENABLE_OPENAPI` | `enable_openapi` (`true`/`false`/`1`/`0`) |
//! | `GANTRY_ROOT_PATH` | `root_path` |
//!
//! ## Example
//!
//! ```yaml
//! title: Pet Store
//! version: 2.0.0
//! contact:
//!   email: ops@example.com
//! openapi_url: /schema.json
//! scheduler:
//!   tasks:
//!     cleanup: jobs.maintenance
//! ```

use crate::error::ConfigError;
use crate::openapi::{Contact, Info, License, Server};
use crate::scheduler::SchedulerConfig;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub title: String,
    pub version: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub terms_of_service: Option<String>,
    pub contact: Option<Contact>,
    pub license: Option<License>,
    pub servers: Vec<Server>,
    /// Path the OpenAPI document is served at
    pub openapi_url: String,
    pub enable_openapi: bool,
    /// Prefix the application is mounted under; used as the default server
    pub root_path: String,
    pub scheduler: Option<SchedulerConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            title: "Gantry".to_string(),
            version: "0.1.0".to_string(),
            summary: None,
            description: None,
            terms_of_service: None,
            contact: None,
            license: None,
            servers: Vec::new(),
            openapi_url: "/openapi.json".to_string(),
            enable_openapi: true,
            root_path: String::new(),
            scheduler: None,
        }
    }
}

impl AppConfig {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        AppConfig {
            title: title.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Load from a YAML or JSON file, chosen by extension.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the file cannot be read, [`ConfigError::Parse`]
    /// when its contents do not match the expected shape.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        let parsed = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        };
        let config = parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Apply `GANTRY_*` overrides from the process environment.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `GANTRY_*` overrides read through `lookup`.
    #[must_use]
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(title) = lookup("GANTRY_TITLE") {
            self.title = title;
        }
        if let Some(version) = lookup("GANTRY_VERSION") {
            self.version = version;
        }
        if let Some(url) = lookup("GANTRY_OPENAPI_URL") {
            self.openapi_url = url;
        }
        if let Some(raw) = lookup("GANTRY_ENABLE_OPENAPI") {
            match parse_flag(&raw) {
                Some(flag) => self.enable_openapi = flag,
                None => warn!(value = %raw, "Ignoring invalid GANTRY_ENABLE_OPENAPI"),
            }
        }
        if let Some(root) = lookup("GANTRY_ROOT_PATH") {
            self.root_path = root;
        }
        self
    }

    pub fn info(&self) -> Info {
        Info {
            title: self.title.clone(),
            summary: self.summary.clone(),
            description: self.description.clone(),
            terms_of_service: self.terms_of_service.clone(),
            contact: self.contact.clone(),
            license: self.license.clone(),
            version: self.version.clone(),
        }
    }

    /// Declared servers, or a single server at `root_path` (`/` when empty).
    pub fn servers(&self) -> Vec<Server> {
        if !self.servers.is_empty() {
            return self.servers.clone();
        }
        if self.root_path.is_empty() {
            vec![Server::new("/")]
        } else {
            vec![Server::new(self.root_path.clone())]
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.openapi_url, "/openapi.json");
        assert!(config.enable_openapi);
        assert_eq!(config.servers(), vec![Server::new("/")]);
    }

    #[test]
    fn overrides_come_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("GANTRY_TITLE", "Orders"),
            ("GANTRY_ENABLE_OPENAPI", "false"),
            ("GANTRY_ROOT_PATH", "/api"),
        ]
        .into_iter()
        .collect();
        let config =
            AppConfig::default().apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.title, "Orders");
        assert!(!config.enable_openapi);
        assert_eq!(config.servers(), vec![Server::new("/api")]);
    }

    #[test]
    fn invalid_flag_is_ignored() {
        let config = AppConfig::default()
            .apply_overrides(|key| (key == "GANTRY_ENABLE_OPENAPI").then(|| "maybe".to_string()));
        assert!(config.enable_openapi);
    }
}
