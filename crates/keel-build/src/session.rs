//! One configured build invocation: selection, planning and execution
use crate::builder::ReactorBuilder;
use crate::error::{BuildError, BuildResult};
use crate::executor::MojoExecutor;
use crate::resume::ResumptionData;
use crate::summary::BuildSummary;
use keel_config::Config;
use keel_graph::{
    GraphBuilder, ProjectActivation, ProjectCollector, ProjectDependencyGraph, ProjectSelector,
    ReactorRequest,
};
use keel_lifecycle::{BuildPlanner, LifecycleBindingSource, PluginLoader, ReportBindingProvider};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Wires loaded configuration into the graph builder, planner and builder
#[derive(Debug, Clone)]
pub struct ReactorSession {
    config: Config,
}

impl ReactorSession {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Selection request for the graph builder
    ///
    /// With `resume` set, the stored resume point is used unless an explicit
    /// `resume_from` is configured.
    pub fn reactor_request(&self) -> BuildResult<ReactorRequest> {
        let reactor = &self.config.reactor;
        let mut request =
            ReactorRequest::new().with_activation(ProjectActivation::parse(&reactor.projects));

        if let Some(root) = self.config.project_root() {
            request = request.with_base_directory(root);
        }
        if let Some(make) = &reactor.also_make {
            request = request.with_make_behavior(make.clone());
        }
        if let Some(from) = &reactor.resume_from {
            request = request.with_resume_from(from.clone());
        }

        if reactor.resume {
            match self.config.project_root() {
                Some(_) if reactor.resume_from.is_some() => {
                    debug!("explicit resume_from takes precedence over stored resumption data");
                }
                Some(root) => match ResumptionData::load(root)? {
                    Some(ResumptionData {
                        resume_from: Some(from),
                        remaining_projects,
                    }) => {
                        info!(resume_from = %from, "resuming previous build");
                        if reactor.projects.is_empty() && !remaining_projects.is_empty() {
                            request = request.with_activation(resumed_activation(&from, &remaining_projects));
                        }
                        request = request.with_resume_from(from);
                    }
                    _ => warn!("resume requested but no resumption data was stored"),
                },
                None => warn!("resume requested outside a project; ignoring"),
            }
        }

        Ok(request)
    }

    /// Planner honoring the configured late-binding policy
    pub fn planner(
        &self,
        loader: Arc<dyn PluginLoader>,
        bindings: Arc<dyn LifecycleBindingSource>,
        reports: Arc<dyn ReportBindingProvider>,
    ) -> BuildPlanner {
        BuildPlanner::new(loader, bindings, reports)
            .with_late_binding(self.config.reactor.allow_late_binding)
    }

    /// Requested tasks, or the configured default goals
    pub fn tasks(&self, requested: &[String]) -> Vec<String> {
        if requested.is_empty() {
            self.config.reactor.goals.clone()
        } else {
            requested.to_vec()
        }
    }

    /// Collect projects, select the reactor and build it
    pub fn execute(
        &self,
        collector: &dyn ProjectCollector,
        planner: Arc<BuildPlanner>,
        executor: Arc<dyn MojoExecutor>,
        requested: &[String],
    ) -> BuildResult<BuildSummary> {
        let tasks = self.tasks(requested);
        if tasks.is_empty() {
            return Err(BuildError::NoGoals);
        }

        let request = self.reactor_request()?;
        let graph = GraphBuilder::new().build(&request, collector)?;
        info!(
            projects = graph.sorted_projects().len(),
            filtered = graph.is_filtered(),
            "reactor build order resolved"
        );

        let builder = ReactorBuilder::from_config(&self.config, planner, executor)?;
        builder.build(&graph, &tasks)
    }
}

/// Only the failed project and those that did not succeed after it; projects
/// removed since the failed build are tolerated
fn resumed_activation(resume_from: &str, remaining: &[String]) -> ProjectActivation {
    std::iter::once(resume_from)
        .chain(remaining.iter().map(String::as_str))
        .fold(ProjectActivation::new(), |activation, selector| {
            activation.with(ProjectSelector::include(selector).optional())
        })
}
