//! Shared configuration defaults and well-known names.
//!
//! Keeps the constants used by the handlers and jobs in one place so the
//! package formats and job identifiers are not redefined per module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Well-known paths inside packaged extensions.
pub mod paths {
    /// Component list of a jar extension
    pub const COMPONENT_LIST: &str = "META-INF/components.txt";
    /// Deprecated component override list of a jar extension
    pub const COMPONENT_OVERRIDE_LIST: &str = "META-INF/component-overrides.txt";
    /// Package descriptor of a xar extension (not a document)
    pub const XAR_PACKAGE_DESCRIPTOR: &str = "package.json";
    /// Suffix of class entries inside a jar
    pub const CLASS_SUFFIX: &str = ".class";
}

/// Job type identifiers used for dispatch.
pub mod job_types {
    pub const REPAIR_XAR: &str = "repairxar";
    pub const DIFF_XAR: &str = "diffXar";
    pub const INSTALL: &str = "install";
    pub const UNINSTALL: &str = "uninstall";
}

/// Extension package types.
pub mod extension_types {
    /// Code package
    pub const JAR: &str = "jar";
    /// Content (document) package
    pub const XAR: &str = "xar";
}

/// Component defaults.
pub mod components {
    /// Priority of a component declared without an explicit priority
    pub const DEFAULT_PRIORITY: i32 = 1000;
    /// Priority forced on legacy override entries
    pub const OVERRIDE_PRIORITY: i32 = 0;
    /// Hint used when a class descriptor does not name one
    pub const DEFAULT_HINT: &str = "default";
}

/// Environment variable names.
pub mod env_vars {
    pub const LOCAL_REPOSITORY_DIR: &str = "NSEXT_LOCAL_REPOSITORY";
    pub const EVENT_CHANNEL_CAPACITY: &str = "NSEXT_EVENT_CAPACITY";
    pub const VERBOSE: &str = "NSEXT_VERBOSE";
    pub const LOG_JSON: &str = "NSEXT_LOG_JSON";
}

/// Default event bus capacity.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default local repository directory name.
pub const DEFAULT_LOCAL_REPOSITORY_DIR: &str = "extension-repository";

/// Runtime configuration of the extension manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Directory where resolved packages are stored
    #[serde(default = "default_local_repository_dir")]
    pub local_repository_dir: PathBuf,
    /// Capacity of the lifecycle event bus
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Verbosity applied to requests that are built from this config
    #[serde(default)]
    pub verbose: bool,
}

fn default_local_repository_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOCAL_REPOSITORY_DIR)
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            local_repository_dir: default_local_repository_dir(),
            event_channel_capacity: default_event_channel_capacity(),
            verbose: false,
        }
    }
}

impl ManagerConfig {
    /// Build a configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            local_repository_dir: std::env::var(env_vars::LOCAL_REPOSITORY_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.local_repository_dir),
            event_channel_capacity: std::env::var(env_vars::EVENT_CHANNEL_CAPACITY)
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|c: &usize| *c > 0)
                .unwrap_or(defaults.event_channel_capacity),
            verbose: std::env::var(env_vars::VERBOSE)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.verbose),
        }
    }

    pub fn with_local_repository_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_repository_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.event_channel_capacity, DEFAULT_EVENT_CHANNEL_CAPACITY);
        assert!(!config.verbose);
        assert_eq!(
            config.local_repository_dir,
            PathBuf::from(DEFAULT_LOCAL_REPOSITORY_DIR)
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ManagerConfig = serde_json::from_str(r#"{"verbose": true}"#).unwrap();
        assert!(config.verbose);
        assert_eq!(config.event_channel_capacity, DEFAULT_EVENT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_override_priority_is_lowest() {
        assert!(components::OVERRIDE_PRIORITY < components::DEFAULT_PRIORITY);
    }
}
