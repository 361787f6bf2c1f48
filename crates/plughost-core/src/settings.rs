//! Host settings and their defaults.
//!
//! Defaults mirror the on-disk layout the host expects next to its working
//! directory; environment variables override them, and the CLI overrides the
//! environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default directory layout.
pub mod paths {
    pub const LIBS_DIR: &str = "./libs";
    pub const PLUGINS_DIR: &str = "./plugins";
    pub const CONFIGS_DIR: &str = "./configs";
    pub const LOGS_DIR: &str = "./logs";
}

/// Environment variable names.
pub mod env_vars {
    pub const LIBS_DIR: &str = "PLUGHOST_LIBS_DIR";
    pub const PLUGINS_DIR: &str = "PLUGHOST_PLUGINS_DIR";
    pub const CONFIGS_DIR: &str = "PLUGHOST_CONFIGS_DIR";
    pub const LOGS_DIR: &str = "PLUGHOST_LOGS_DIR";
    pub const LOG_PREFIX: &str = "PLUGHOST_LOG_PREFIX";
    pub const LOG_JSON: &str = "PLUGHOST_LOG_JSON";
}

/// Prefix written at the start of every persisted log line.
pub const DEFAULT_LOG_PREFIX: &str = "PlugHost";

/// Where the host finds modules and keeps its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Dependency modules, loaded before any extension module.
    pub libs_dir: PathBuf,
    /// Extension modules.
    pub plugins_dir: PathBuf,
    /// One config file per extension.
    pub configs_dir: PathBuf,
    /// One log file per host run.
    pub logs_dir: PathBuf,
    pub log_prefix: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            libs_dir: PathBuf::from(paths::LIBS_DIR),
            plugins_dir: PathBuf::from(paths::PLUGINS_DIR),
            configs_dir: PathBuf::from(paths::CONFIGS_DIR),
            logs_dir: PathBuf::from(paths::LOGS_DIR),
            log_prefix: DEFAULT_LOG_PREFIX.to_string(),
        }
    }
}

impl HostSettings {
    /// Defaults overridden by any `PLUGHOST_*` variables that are set.
    pub fn from_env() -> Self {
        Self::default().with_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty(env_vars::LIBS_DIR) {
            self.libs_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(env_vars::PLUGINS_DIR) {
            self.plugins_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(env_vars::CONFIGS_DIR) {
            self.configs_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(env_vars::LOGS_DIR) {
            self.logs_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(env_vars::LOG_PREFIX) {
            self.log_prefix = v;
        }
        self
    }

    /// Resolve every directory against `root`.
    pub fn rooted_at(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.libs_dir = root.join(&self.libs_dir);
        self.plugins_dir = root.join(&self.plugins_dir);
        self.configs_dir = root.join(&self.configs_dir);
        self.logs_dir = root.join(&self.logs_dir);
        self
    }
}
