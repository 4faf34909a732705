//! Keel Configuration System
//!
//! Provides reactor configuration for Keel builds:
//! - Reactor settings (`[reactor]` table of keel.toml)
//! - Global user defaults (~/.keel/config.toml)
//! - Environment overrides (KEEL_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.keel/config.toml)
//! 2. Project config (./keel.toml)
//! 3. Environment variables (KEEL_THREADS, KEEL_FAIL_MODE, KEEL_RESUME_FROM)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use keel_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! let threads = config.threads().unwrap();
//! ```

pub mod global;
pub mod loader;
pub mod reactor;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

impl ConfigError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use reactor::{FailMode, ProjectConfig, ReactorConfig, ThreadSpec};
