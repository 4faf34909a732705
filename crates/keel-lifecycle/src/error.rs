/// Lifecycle and build plan error types
use thiserror::Error;

pub type PlanResult<T> = Result<T, PlanError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("Cannot find lifecycle for phase: {phase}")]
    UnknownPhase { phase: String },

    #[error("Mojo: {goal}{} does not exist in plugin: {plugin}", referenced_by.as_ref().map(|r| format!(" (referenced by: {r})")).unwrap_or_default())]
    MissingGoal {
        goal: String,
        plugin: String,
        referenced_by: Option<String>,
    },

    #[error("Failed to resolve plugin for mojo binding: {binding}\nReason: {reason}")]
    PluginResolution { binding: String, reason: String },

    #[error("Failed to load overlay lifecycle: {lifecycle}. Reason: {reason}")]
    OverlayLoad { lifecycle: String, reason: String },

    #[error("Invalid task '{task}': {reason}")]
    InvalidTask { task: String, reason: String },

    #[error("Failed to load lifecycle bindings for {project}: {reason}")]
    Bindings { project: String, reason: String },

    #[error("Build plan cache lock poisoned")]
    Poisoned,
}

impl PlanError {
    pub fn unknown_phase(phase: impl Into<String>) -> Self {
        PlanError::UnknownPhase {
            phase: phase.into(),
        }
    }

    /// Create a missing-goal error, optionally naming the goal that referenced it
    pub fn missing_goal(
        goal: impl Into<String>,
        plugin: impl Into<String>,
        referenced_by: Option<&str>,
    ) -> Self {
        PlanError::MissingGoal {
            goal: goal.into(),
            plugin: plugin.into(),
            referenced_by: referenced_by.map(str::to_string),
        }
    }

    pub fn invalid_task(task: impl Into<String>, reason: impl Into<String>) -> Self {
        PlanError::InvalidTask {
            task: task.into(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by a plugin loader
///
/// Not fatal to planning on its own: the planner turns it into a late-bound
/// mojo unless late binding is disabled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Failed to load plugin {plugin}: {reason}")]
pub struct PluginLoadError {
    pub plugin: String,
    pub reason: String,
}

impl PluginLoadError {
    pub fn new(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }
}
