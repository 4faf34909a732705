//! Global Configuration (~/.keel/config.toml)
//!
//! User-wide reactor defaults that apply when a project does not set them.

use crate::reactor::{FailMode, ThreadSpec};
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default reactor settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<GlobalDefaults>,
}

/// Reactor defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalDefaults {
    /// Default worker threads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<ThreadSpec>,

    /// Default failure handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_mode: Option<FailMode>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: GlobalConfig =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
                file: path.to_path_buf(),
                error: e,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(threads) = self.defaults.as_ref().and_then(|d| d.threads.as_ref()) {
            threads.resolve().map_err(|e| match e {
                ConfigError::InvalidValue { reason, .. } => {
                    ConfigError::invalid_value("defaults.threads", reason)
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Default location (~/.keel/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".keel").join("config.toml"))
    }

    pub fn threads(&self) -> Option<&ThreadSpec> {
        self.defaults.as_ref().and_then(|d| d.threads.as_ref())
    }

    pub fn fail_mode(&self) -> Option<FailMode> {
        self.defaults.as_ref().and_then(|d| d.fail_mode)
    }
}
