//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::reactor::{FailMode, ProjectConfig, ReactorConfig, ThreadSpec};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "keel.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.keel/config.toml) - lowest priority
/// 2. Project config (./keel.toml) - overrides global
/// 3. Environment variables (KEEL_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
#[derive(Debug)]
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Reactor settings from keel.toml plus environment overrides
    pub reactor: ReactorConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where keel.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config file instead of ~/.keel/config.toml
    pub fn with_global_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find keel.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;
        let global = self.load_global_config()?;
        let reactor = self.apply_env_overrides(project_config.reactor)?;

        Ok(Config {
            reactor,
            global,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global = self.load_global_config()?;
        let reactor = self.apply_env_overrides(project_config.reactor)?;

        Ok(Config {
            reactor,
            global,
            project_root: config_path.parent().map(Path::to_path_buf),
        })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                tracing::debug!(path = %config_path.display(), "loading project config");
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.keel/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match GlobalConfig::global_config_path() {
                Ok(path) => {
                    self.global_config_path = Some(path.clone());
                    path
                }
                Err(ConfigError::HomeNotFound) => {
                    tracing::debug!("no home directory, using default global config");
                    return Ok(GlobalConfig::default());
                }
                Err(e) => return Err(e),
            },
        };

        // Global config is optional
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides to reactor config
    ///
    /// Recognized: KEEL_THREADS, KEEL_FAIL_MODE, KEEL_RESUME_FROM
    fn apply_env_overrides(&self, mut reactor: ReactorConfig) -> ConfigResult<ReactorConfig> {
        if let Ok(threads) = env::var("KEEL_THREADS") {
            reactor.threads = Some(threads.parse::<ThreadSpec>()?);
        }

        if let Ok(mode) = env::var("KEEL_FAIL_MODE") {
            reactor.fail_mode = Some(mode.parse::<FailMode>()?);
        }

        if let Ok(selector) = env::var("KEEL_RESUME_FROM") {
            if !selector.trim().is_empty() {
                reactor.resume_from = Some(selector.trim().to_string());
            }
        }

        Ok(reactor)
    }

    /// Get the global configuration directory (~/.keel)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".keel"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Effective worker threads (reactor > global > 1)
    pub fn threads(&self) -> ConfigResult<usize> {
        match self.reactor.threads.as_ref().or_else(|| self.global.threads()) {
            Some(spec) => spec.resolve(),
            None => Ok(1),
        }
    }

    /// Effective fail mode (reactor > global > fail-fast)
    pub fn fail_mode(&self) -> FailMode {
        self.reactor
            .fail_mode
            .or_else(|| self.global.fail_mode())
            .unwrap_or_default()
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has keel.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn clear_env() {
        env::remove_var("KEEL_THREADS");
        env::remove_var("KEEL_FAIL_MODE");
        env::remove_var("KEEL_RESUME_FROM");
    }

    fn isolated_loader(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::with_global_config_path(dir.path().join("global.toml"))
    }

    #[test]
    #[serial]
    fn test_load_without_project() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let mut loader = isolated_loader(&temp);

        let config = loader.load_from_directory(temp.path()).unwrap();
        assert!(!config.is_project());
        assert_eq!(config.threads().unwrap(), 1);
        assert_eq!(config.fail_mode(), FailMode::FailFast);
    }

    #[test]
    #[serial]
    fn test_env_overrides_project() {
        clear_env();
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            "[reactor]\nthreads = 2\nfail_mode = \"fail-fast\"\n",
        )
        .unwrap();

        env::set_var("KEEL_THREADS", "5");
        env::set_var("KEEL_FAIL_MODE", "fail-at-end");
        env::set_var("KEEL_RESUME_FROM", ":core");

        let mut loader = isolated_loader(&temp);
        let config = loader.load_from_directory(temp.path());
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.threads().unwrap(), 5);
        assert_eq!(config.fail_mode(), FailMode::FailAtEnd);
        assert_eq!(config.reactor.resume_from.as_deref(), Some(":core"));
    }

    #[test]
    #[serial]
    fn test_invalid_env_override() {
        clear_env();
        let temp = TempDir::new().unwrap();
        env::set_var("KEEL_FAIL_MODE", "sometimes");

        let mut loader = isolated_loader(&temp);
        let result = loader.load_from_directory(temp.path());
        clear_env();

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    #[serial]
    fn test_global_defaults_apply() {
        clear_env();
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("global.toml"),
            "[defaults]\nthreads = 3\nfail_mode = \"fail-never\"\n",
        )
        .unwrap();

        let mut loader = isolated_loader(&temp);
        let config = loader.load_from_directory(temp.path()).unwrap();
        assert_eq!(config.threads().unwrap(), 3);
        assert_eq!(config.fail_mode(), FailMode::FailNever);
    }
}
