//! Task segments and the per-project units scheduled for them
use crate::error::BuildResult;
use keel_graph::{Project, ProjectId, ScheduledUnit};
use keel_lifecycle::{is_valid_phase, BuildPlanner};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Consecutive tasks that run together across the reactor
///
/// An aggregating segment runs on the execution root only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSegment {
    pub tasks: Vec<String>,
    pub aggregating: bool,
}

impl TaskSegment {
    pub fn new(aggregating: bool) -> Self {
        Self {
            tasks: Vec::new(),
            aggregating,
        }
    }
}

impl fmt::Display for TaskSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tasks.join(" "))?;
        if self.aggregating {
            write!(f, " (aggregating)")?;
        }
        Ok(())
    }
}

/// Split tasks wherever the aggregating flag changes
///
/// Phases never aggregate. A goal aggregates when its mojo descriptor says
/// so; a goal whose plugin cannot be loaded yet is treated as per-project.
pub fn calculate_task_segments(
    tasks: &[String],
    planner: &BuildPlanner,
    root: &Project,
) -> BuildResult<Vec<TaskSegment>> {
    let mut segments: Vec<TaskSegment> = Vec::new();

    for task in tasks {
        let aggregating = if is_valid_phase(task) {
            false
        } else {
            let binding = planner.parse_task(task, root)?;
            match planner.loader().load_plugin(&binding, root) {
                Ok(plugin) => plugin.mojo(&binding.goal).is_some_and(|m| m.aggregator),
                Err(e) => {
                    debug!(task = %task, error = %e, "plugin not loadable while segmenting");
                    false
                }
            }
        };

        match segments.last_mut() {
            Some(last) if last.aggregating == aggregating => last.tasks.push(task.clone()),
            _ => {
                let mut segment = TaskSegment::new(aggregating);
                segment.tasks.push(task.clone());
                segments.push(segment);
            }
        }
    }

    Ok(segments)
}

/// One project paired with the tasks it runs in a segment
#[derive(Debug, Clone)]
pub struct ProjectSegment {
    pub project: Arc<Project>,
    pub tasks: Vec<String>,
}

impl ProjectSegment {
    pub fn new(project: Arc<Project>, segment: &TaskSegment) -> Self {
        Self {
            project,
            tasks: segment.tasks.clone(),
        }
    }
}

impl ScheduledUnit for ProjectSegment {
    fn project_id(&self) -> &ProjectId {
        &self.project.id
    }
}

/// Units for one segment, in build order
pub fn project_segments(
    segment: &TaskSegment,
    sorted: &[Arc<Project>],
) -> Vec<ProjectSegment> {
    if segment.aggregating {
        let root = sorted
            .iter()
            .find(|p| p.execution_root)
            .or_else(|| sorted.first());
        return root
            .map(|p| vec![ProjectSegment::new(p.clone(), segment)])
            .unwrap_or_default();
    }

    sorted
        .iter()
        .map(|p| ProjectSegment::new(p.clone(), segment))
        .collect()
}
