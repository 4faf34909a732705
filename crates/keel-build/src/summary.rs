//! Per-project outcome of a reactor build
use keel_config::FailMode;
use keel_graph::ProjectId;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// How one project ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ProjectStatus {
    Success,
    /// `goal` is the failing binding, or `None` when planning failed
    Failed {
        goal: Option<String>,
        message: String,
    },
    Skipped,
}

impl ProjectStatus {
    /// Failure wins over skip, skip wins over success
    fn severity(&self) -> u8 {
        match self {
            ProjectStatus::Success => 0,
            ProjectStatus::Skipped => 1,
            ProjectStatus::Failed { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectOutcome {
    pub project: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
    pub duration: Duration,
}

/// Outcomes in reactor order
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    fail_mode: FailMode,
    outcomes: Vec<ProjectOutcome>,
    #[serde(skip)]
    index: HashMap<ProjectId, usize>,
    total: Duration,
}

impl BuildSummary {
    pub fn new(fail_mode: FailMode) -> Self {
        Self {
            fail_mode,
            outcomes: Vec::new(),
            index: HashMap::new(),
            total: Duration::ZERO,
        }
    }

    /// Register a project slot; the first registration fixes its position
    pub fn register(&mut self, project: &ProjectId, name: &str) {
        if self.index.contains_key(project) {
            return;
        }
        self.index.insert(project.clone(), self.outcomes.len());
        self.outcomes.push(ProjectOutcome {
            project: project.clone(),
            name: name.to_string(),
            status: ProjectStatus::Success,
            duration: Duration::ZERO,
        });
    }

    /// Record one segment's result, keeping the most severe status
    pub fn record(&mut self, project: &ProjectId, name: &str, status: ProjectStatus, duration: Duration) {
        self.register(project, name);
        if let Some(&i) = self.index.get(project) {
            let outcome = &mut self.outcomes[i];
            outcome.duration += duration;
            if status.severity() > outcome.status.severity() {
                outcome.status = status;
            }
        }
    }

    pub fn set_total(&mut self, total: Duration) {
        self.total = total;
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn fail_mode(&self) -> FailMode {
        self.fail_mode
    }

    pub fn outcomes(&self) -> &[ProjectOutcome] {
        &self.outcomes
    }

    pub fn outcome(&self, project: &ProjectId) -> Option<&ProjectOutcome> {
        self.index.get(project).map(|&i| &self.outcomes[i])
    }

    pub fn failed(&self) -> impl Iterator<Item = &ProjectOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ProjectStatus::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    /// Whether the build as a whole succeeded; fail-never never fails
    pub fn is_success(&self) -> bool {
        self.fail_mode == FailMode::FailNever || !self.has_failures()
    }

    /// Emit the reactor summary through tracing
    pub fn log(&self) {
        info!("Reactor Summary:");
        for outcome in &self.outcomes {
            match &outcome.status {
                ProjectStatus::Success => {
                    info!(project = %outcome.name, duration = ?outcome.duration, "SUCCESS")
                }
                ProjectStatus::Failed { goal, message } => info!(
                    project = %outcome.name,
                    duration = ?outcome.duration,
                    goal = goal.as_deref().unwrap_or("<planning>"),
                    %message,
                    "FAILURE"
                ),
                ProjectStatus::Skipped => info!(project = %outcome.name, "SKIPPED"),
            }
        }
        let result = if self.is_success() { "BUILD SUCCESS" } else { "BUILD FAILURE" };
        info!(total = ?self.total, "{result}");
    }
}
