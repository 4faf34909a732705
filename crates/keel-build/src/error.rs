/// Reactor build error types
use keel_config::ConfigError;
use keel_graph::GraphError;
use keel_lifecycle::PlanError;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No goals have been specified for this build")]
    NoGoals,

    #[error("Failed to start build threads: {0}")]
    ThreadPool(String),

    #[error("Invalid resumption data at {path}: {reason}")]
    ResumptionData { path: PathBuf, reason: String },

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("A build worker stopped without reporting a result")]
    WorkerLost,

    #[error("Reactor build status lock poisoned")]
    Poisoned,
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a resumption data error
    pub fn resumption(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ResumptionData {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
