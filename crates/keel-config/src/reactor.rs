//! Reactor Configuration (keel.toml)
//!
//! Handles the `[reactor]` table of the project's `keel.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Project configuration file (keel.toml)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Reactor settings
    #[serde(default)]
    pub reactor: ReactorConfig,
}

/// Reactor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReactorConfig {
    /// Project selectors: plain = required, `?sel` = optional, `!sel`/`-sel` = excluded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,

    /// Also-make behavior ("none", "upstream", "downstream", "both")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub also_make: Option<String>,

    /// Project selector to resume the build from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_from: Option<String>,

    /// Worker threads: a count or "<n>C" per CPU core
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<ThreadSpec>,

    /// Reaction to project failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_mode: Option<FailMode>,

    /// Default tasks when none are requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goals: Vec<String>,

    /// Defer unloadable plugins to execution time (default: true)
    #[serde(default = "default_true")]
    pub allow_late_binding: bool,

    /// Resume from stored resumption data of a failed build
    #[serde(default)]
    pub resume: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            also_make: None,
            resume_from: None,
            threads: None,
            fail_mode: None,
            goals: Vec::new(),
            allow_late_binding: true,
            resume: false,
        }
    }
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.reactor.validate()?;
        Ok(config)
    }
}

impl ReactorConfig {
    /// Validate the reactor settings
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(threads) = &self.threads {
            threads.validate()?;
        }

        for selector in &self.projects {
            let stripped = selector
                .trim()
                .trim_start_matches(['!', '-'])
                .trim_start_matches('?');
            if stripped.is_empty() {
                return Err(ConfigError::invalid_value(
                    "reactor.projects",
                    format!("empty project selector '{selector}'"),
                ));
            }
        }

        if self.goals.iter().any(|g| g.trim().is_empty()) {
            return Err(ConfigError::invalid_value("reactor.goals", "empty goal"));
        }

        Ok(())
    }
}

/// Worker thread count: fixed, or a multiple of the CPU core count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThreadSpec {
    Count(usize),
    Spec(String),
}

impl ThreadSpec {
    /// Resolve against the machine's CPU count
    pub fn resolve(&self) -> ConfigResult<usize> {
        self.resolve_with(num_cpus::get())
    }

    /// Resolve against a given core count
    pub fn resolve_with(&self, cores: usize) -> ConfigResult<usize> {
        let threads = match self {
            ThreadSpec::Count(count) => *count,
            ThreadSpec::Spec(raw) => {
                let raw = raw.trim();
                match raw.strip_suffix(['C', 'c']) {
                    Some(factor) => {
                        let factor: f64 = factor.trim().parse().map_err(|_| invalid_threads(raw))?;
                        if !factor.is_finite() || factor < 0.0 {
                            return Err(invalid_threads(raw));
                        }
                        (factor * cores as f64) as usize
                    }
                    None => raw.parse().map_err(|_| invalid_threads(raw))?,
                }
            }
        };

        if threads == 0 {
            return Err(ConfigError::invalid_value(
                "reactor.threads",
                "thread count must be at least 1",
            ));
        }
        Ok(threads)
    }

    fn validate(&self) -> ConfigResult<()> {
        self.resolve().map(|_| ())
    }
}

impl FromStr for ThreadSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = match s.trim().parse::<usize>() {
            Ok(count) => ThreadSpec::Count(count),
            Err(_) => ThreadSpec::Spec(s.trim().to_string()),
        };
        spec.validate()?;
        Ok(spec)
    }
}

fn invalid_threads(raw: &str) -> ConfigError {
    ConfigError::invalid_value(
        "reactor.threads",
        format!("expected a count or '<n>C', got '{raw}'"),
    )
}

/// How the reactor reacts to a failed project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailMode {
    /// Stop scheduling at the first failure
    #[default]
    FailFast,
    /// Skip dependents of failed projects, keep building the rest
    FailAtEnd,
    /// Build everything and never fail the build for project failures
    FailNever,
}

impl FromStr for FailMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fail-fast" => Ok(FailMode::FailFast),
            "fail-at-end" => Ok(FailMode::FailAtEnd),
            "fail-never" => Ok(FailMode::FailNever),
            other => Err(ConfigError::invalid_value(
                "reactor.fail_mode",
                format!("must be 'fail-fast', 'fail-at-end', or 'fail-never', got '{other}'"),
            )),
        }
    }
}

impl fmt::Display for FailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailMode::FailFast => "fail-fast",
            FailMode::FailAtEnd => "fail-at-end",
            FailMode::FailNever => "fail-never",
        };
        write!(f, "{name}")
    }
}
