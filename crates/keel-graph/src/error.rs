/// Project graph and reactor selection error types
use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("The projects in the reactor contain a cyclic reference: {}", cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    #[error("Project '{project}' is duplicated in the reactor")]
    DuplicateProject { project: String },

    #[error("Project not found in graph: {project}")]
    UnknownProject { project: String },

    #[error("Could not find the selected project in the reactor: {selector}")]
    SelectorNotFound { selector: String },

    #[error("Could not find project to resume reactor build from: {selector} vs {available}")]
    ResumeTargetNotFound { selector: String, available: String },

    #[error("No project in the reactor matched the selection: {}", selectors.join(", "))]
    NoProjectsSelected { selectors: Vec<String> },

    #[error("Invalid reactor make behavior: {0}")]
    InvalidMakeBehavior(String),

    #[error("The requested exclusions would remove every project from the reactor: {}", excluded.join(", "))]
    EmptyReactor { excluded: Vec<String> },

    #[error("Project '{project}' is not scheduled in this build")]
    NotScheduled { project: String },

    #[error("Project '{project}' was already marked finished")]
    AlreadyFinished { project: String },

    #[error("Failed to collect projects:\n{}", problems.join("\n"))]
    ProjectBuilding { problems: Vec<String> },

    #[error("Reactor state lock poisoned")]
    Poisoned,
}

impl GraphError {
    /// Create a cycle error from the participating project keys
    pub fn cycle<I, S>(cycle: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::CycleDetected {
            cycle: cycle.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an unknown project error
    pub fn unknown(project: impl ToString) -> Self {
        Self::UnknownProject {
            project: project.to_string(),
        }
    }

    /// Create a selector not found error
    pub fn selector_not_found(selector: impl Into<String>) -> Self {
        Self::SelectorNotFound {
            selector: selector.into(),
        }
    }
}
