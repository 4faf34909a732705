//! Plugin and goal metadata consulted while planning
use serde::{Deserialize, Serialize};

/// Metadata of one plugin goal
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MojoDescriptor {
    pub goal: String,
    /// Goal of the same plugin to run first
    #[serde(default)]
    pub execute_goal: Option<String>,
    /// Lifecycle phase to run first, in a forked copy of the plan
    #[serde(default)]
    pub execute_phase: Option<String>,
    /// Plugin lifecycle overlay applied to the forked phase
    #[serde(default)]
    pub execute_lifecycle: Option<String>,
    #[serde(default)]
    pub requires_reports: bool,
    /// Runs once for the whole reactor instead of once per project
    #[serde(default)]
    pub aggregator: bool,
}

impl MojoDescriptor {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Self::default()
        }
    }

    pub fn with_execute_goal(mut self, goal: impl Into<String>) -> Self {
        self.execute_goal = Some(goal.into());
        self
    }

    pub fn with_execute_phase(mut self, phase: impl Into<String>) -> Self {
        self.execute_phase = Some(phase.into());
        self
    }

    pub fn with_execute_lifecycle(mut self, lifecycle: impl Into<String>) -> Self {
        self.execute_lifecycle = Some(lifecycle.into());
        self
    }

    pub fn requiring_reports(mut self) -> Self {
        self.requires_reports = true;
        self
    }

    pub fn as_aggregator(mut self) -> Self {
        self.aggregator = true;
        self
    }
}

/// Metadata of a loaded plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    /// Short name usable as `prefix:goal`
    #[serde(default)]
    pub goal_prefix: Option<String>,
    #[serde(default)]
    pub mojos: Vec<MojoDescriptor>,
}

impl PluginDescriptor {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            goal_prefix: None,
            mojos: Vec::new(),
        }
    }

    pub fn with_goal_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.goal_prefix = Some(prefix.into());
        self
    }

    pub fn with_mojo(mut self, mojo: MojoDescriptor) -> Self {
        self.mojos.push(mojo);
        self
    }

    /// `group:artifact:version`
    pub fn id(&self) -> String {
        format!("{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }

    pub fn mojo(&self, goal: &str) -> Option<&MojoDescriptor> {
        self.mojos.iter().find(|m| m.goal == goal)
    }
}
