//! Execution of individual goals
use keel_graph::Project;
use keel_lifecycle::MojoBinding;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

/// A goal that ran and failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct MojoFailure {
    pub message: String,
}

impl MojoFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Runs one bound goal against one project
///
/// Called concurrently from worker threads for different projects.
pub trait MojoExecutor: Send + Sync {
    fn execute(&self, project: &Project, binding: &MojoBinding) -> Result<(), MojoFailure>;
}

/// Executor that only logs what would run
#[derive(Debug, Default)]
pub struct LoggingExecutor {
    executed: Mutex<Vec<String>>,
}

impl LoggingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `project-artifact goal-binding` entries in execution order
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

impl MojoExecutor for LoggingExecutor {
    fn execute(&self, project: &Project, binding: &MojoBinding) -> Result<(), MojoFailure> {
        info!(project = %project.id, mojo = %binding, "executing");
        let mut log = self
            .executed
            .lock()
            .map_err(|_| MojoFailure::new("execution log lock poisoned"))?;
        log.push(format!("{} {}", project.id.artifact_id, binding.goal_key()));
        Ok(())
    }
}
