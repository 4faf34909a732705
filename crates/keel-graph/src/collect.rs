//! Interface to the external project collection step
use crate::builder::ReactorRequest;
use crate::error::{GraphError, GraphResult};
use crate::project::Project;
use std::fmt;

/// A problem found while building a project's effective model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProblem {
    /// Project the problem belongs to
    pub project: String,
    pub message: String,
    /// Location inside the project descriptor, if known
    pub location: Option<String>,
}

impl ModelProblem {
    pub fn new(project: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for ModelProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {} @ {}", self.project, self.message, location),
            None => write!(f, "{}: {}", self.project, self.message),
        }
    }
}

/// Projects collected for one build invocation
#[derive(Debug, Clone, Default)]
pub struct ProjectCollection {
    pub projects: Vec<Project>,
    /// Non-fatal problems, reported as warnings
    pub problems: Vec<ModelProblem>,
}

impl ProjectCollection {
    pub fn new(projects: Vec<Project>) -> Self {
        Self {
            projects,
            problems: Vec::new(),
        }
    }
}

/// Collects every project reachable from the build root
pub trait ProjectCollector {
    fn collect(&self, request: &ReactorRequest) -> GraphResult<ProjectCollection>;
}

/// Collector over a fixed, already-loaded project list
#[derive(Debug, Clone, Default)]
pub struct StaticProjectCollector {
    projects: Vec<Project>,
}

impl StaticProjectCollector {
    pub fn new(projects: Vec<Project>) -> Self {
        Self { projects }
    }
}

impl ProjectCollector for StaticProjectCollector {
    fn collect(&self, _request: &ReactorRequest) -> GraphResult<ProjectCollection> {
        if self.projects.is_empty() {
            return Err(GraphError::ProjectBuilding {
                problems: vec!["no projects to build".to_string()],
            });
        }
        Ok(ProjectCollection::new(self.projects.clone()))
    }
}
