//! Reactor selection: picks the active projects and builds the final graph
use crate::collect::ProjectCollector;
use crate::error::{GraphError, GraphResult};
use crate::filtered::FilteredProjectGraph;
use crate::graph::{ProjectDependencyGraph, ProjectGraph};
use crate::project::{Project, ProjectId};
use crate::selector::{matches_project, ProjectActivation, ProjectSelector};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Which dependencies of the selected projects are built along with them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MakeBehavior {
    #[default]
    None,
    Upstream,
    Downstream,
    Both,
}

impl MakeBehavior {
    /// Parse a make behavior, rejecting unknown values
    pub fn parse(value: Option<&str>) -> GraphResult<Self> {
        match value.map(str::trim) {
            None | Some("") | Some("none") => Ok(Self::None),
            Some("upstream") | Some("make-upstream") => Ok(Self::Upstream),
            Some("downstream") | Some("make-downstream") => Ok(Self::Downstream),
            Some("both") | Some("make-both") => Ok(Self::Both),
            Some(other) => Err(GraphError::InvalidMakeBehavior(other.to_string())),
        }
    }

    pub fn upstream(self) -> bool {
        matches!(self, Self::Upstream | Self::Both)
    }

    pub fn downstream(self) -> bool {
        matches!(self, Self::Downstream | Self::Both)
    }
}

/// Reactor selection request for one build invocation
#[derive(Debug, Clone, Default)]
pub struct ReactorRequest {
    /// Directory selectors are resolved against
    pub base_directory: Option<PathBuf>,
    pub activation: ProjectActivation,
    /// Raw make behavior, validated when the graph is built
    pub make_behavior: Option<String>,
    pub resume_from: Option<String>,
    /// Projects already chosen by an earlier selection; skips the pipeline
    pub selected: Option<Vec<ProjectId>>,
}

impl ReactorRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_directory = Some(dir.into());
        self
    }

    pub fn with_activation(mut self, activation: ProjectActivation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_make_behavior(mut self, behavior: impl Into<String>) -> Self {
        self.make_behavior = Some(behavior.into());
        self
    }

    pub fn with_resume_from(mut self, selector: impl Into<String>) -> Self {
        self.resume_from = Some(selector.into());
        self
    }

    pub fn with_selected(mut self, selected: Vec<ProjectId>) -> Self {
        self.selected = Some(selected);
        self
    }
}

/// Graph handed to the scheduler: the full graph or a filtered view
#[derive(Debug)]
pub enum ReactorGraph {
    Full(Arc<ProjectGraph>),
    Filtered(FilteredProjectGraph),
}

impl ReactorGraph {
    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::Filtered(_))
    }

    fn inner(&self) -> &dyn ProjectDependencyGraph {
        match self {
            Self::Full(graph) => graph.as_ref(),
            Self::Filtered(view) => view,
        }
    }
}

impl ProjectDependencyGraph for ReactorGraph {
    fn all_projects(&self) -> Vec<Arc<Project>> {
        self.inner().all_projects()
    }

    fn sorted_projects(&self) -> Vec<Arc<Project>> {
        self.inner().sorted_projects()
    }

    fn upstream_projects(
        &self,
        project: &ProjectId,
        transitive: bool,
    ) -> GraphResult<Vec<Arc<Project>>> {
        self.inner().upstream_projects(project, transitive)
    }

    fn downstream_projects(
        &self,
        project: &ProjectId,
        transitive: bool,
    ) -> GraphResult<Vec<Arc<Project>>> {
        self.inner().downstream_projects(project, transitive)
    }
}

/// Builds the reactor graph from collected projects and a selection request
#[derive(Debug, Default)]
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Collect the projects and run the selection pipeline
    pub fn build(
        &self,
        request: &ReactorRequest,
        collector: &dyn ProjectCollector,
    ) -> GraphResult<ReactorGraph> {
        let collection = collector.collect(request)?;
        if !collection.problems.is_empty() {
            for problem in &collection.problems {
                warn!(%problem, "problem while building effective model");
            }
            warn!("It is highly recommended to fix these problems because they threaten the stability of your build.");
        }
        self.build_from_projects(collection.projects, request)
    }

    /// Run the selection pipeline over already-collected projects
    pub fn build_from_projects(
        &self,
        projects: Vec<Project>,
        request: &ReactorRequest,
    ) -> GraphResult<ReactorGraph> {
        validate_projects(&projects);
        let graph = Arc::new(ProjectGraph::build(projects)?);
        let all = graph.sorted_projects();

        if let Some(selected) = &request.selected {
            return Ok(wrap(graph, &all, selected.iter().collect()));
        }

        let make = MakeBehavior::parse(request.make_behavior.as_deref())?;
        let base = request.base_directory.as_deref();

        let mut active = select_projects(&all, graph.as_ref(), request, make)?;
        active = trim_resumed_projects(active, graph.as_ref(), request, make)?;
        active = trim_excluded_projects(active, &request.activation, base)?;

        debug!(
            active = active.len(),
            total = all.len(),
            "reactor projects selected"
        );
        let ids: Vec<&ProjectId> = active.iter().map(|p| &p.id).collect();
        Ok(wrap(graph, &all, ids))
    }
}

fn wrap(graph: Arc<ProjectGraph>, all: &[Arc<Project>], active: Vec<&ProjectId>) -> ReactorGraph {
    if active.len() == all.len() {
        ReactorGraph::Full(graph)
    } else {
        ReactorGraph::Filtered(FilteredProjectGraph::new(graph, active))
    }
}

/// Warn about projects using a reactor project as build extension
fn validate_projects(projects: &[Project]) {
    let keys: HashSet<String> = projects.iter().map(|p| p.id.to_string()).collect();

    for project in projects {
        for plugin in project.build_plugins.iter().filter(|p| p.extensions) {
            let Some(version) = &plugin.plugin.version else {
                continue;
            };
            let key = format!("{}:{}", plugin.plugin.versionless_key(), version);
            if keys.contains(&key) {
                warn!(
                    project = %project.name,
                    extension = %key,
                    "extension built in the same reactor; the plugin was pulled from the local repository"
                );
            }
        }
    }
}

/// Steps 1 and 2: explicit selectors (or the base directory) plus also-make
fn select_projects(
    all: &[Arc<Project>],
    graph: &dyn ProjectDependencyGraph,
    request: &ReactorRequest,
    make: MakeBehavior,
) -> GraphResult<Vec<Arc<Project>>> {
    let base = request.base_directory.as_deref();

    let selected: Vec<Arc<Project>> = if request.activation.has_included() {
        let mut chosen = Vec::new();
        for selector in request.activation.included() {
            if let Some(project) = find_match(all, selector, base)? {
                chosen.push(project);
            }
        }
        if chosen.is_empty() {
            return Err(GraphError::NoProjectsSelected {
                selectors: request
                    .activation
                    .included()
                    .map(|s| s.selector.clone())
                    .collect(),
            });
        }
        chosen
    } else {
        match base {
            Some(dir) => all
                .iter()
                .filter(|p| p.basedir.starts_with(dir))
                .cloned()
                .collect(),
            None => all.to_vec(),
        }
    };

    let selected = include_also_make(selected, graph, make)?;
    Ok(in_build_order(all, &selected))
}

/// Steps 3 and 4: trim to the resume point, then restore also-make projects
fn trim_resumed_projects(
    projects: Vec<Arc<Project>>,
    graph: &dyn ProjectDependencyGraph,
    request: &ReactorRequest,
    make: MakeBehavior,
) -> GraphResult<Vec<Arc<Project>>> {
    let Some(selector) = request.resume_from.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(projects);
    };
    let base = request.base_directory.as_deref();

    let Some(start) = projects
        .iter()
        .position(|p| matches_project(selector, p, base))
    else {
        return Err(GraphError::ResumeTargetNotFound {
            selector: selector.to_string(),
            available: format_projects(&projects),
        });
    };

    let resumed = projects[start..].to_vec();
    let all = graph.sorted_projects();
    let resumed = include_also_make(resumed, graph, make)?;
    Ok(in_build_order(&all, &resumed))
}

/// Step 5: drop excluded projects; the reactor may not end up empty
fn trim_excluded_projects(
    projects: Vec<Arc<Project>>,
    activation: &ProjectActivation,
    base: Option<&Path>,
) -> GraphResult<Vec<Arc<Project>>> {
    if !activation.has_excluded() {
        return Ok(projects);
    }

    let mut excluded = HashSet::new();
    for selector in activation.excluded() {
        if let Some(project) = find_match(&projects, selector, base)? {
            excluded.insert(project.id.clone());
        }
    }

    let remaining: Vec<Arc<Project>> = projects
        .into_iter()
        .filter(|p| !excluded.contains(&p.id))
        .collect();

    if remaining.is_empty() {
        return Err(GraphError::EmptyReactor {
            excluded: activation.excluded().map(|s| s.selector.clone()).collect(),
        });
    }
    Ok(remaining)
}

fn find_match(
    projects: &[Arc<Project>],
    selector: &ProjectSelector,
    base: Option<&Path>,
) -> GraphResult<Option<Arc<Project>>> {
    if let Some(project) = projects.iter().find(|p| selector.matches(p, base)) {
        return Ok(Some(project.clone()));
    }
    if selector.optional {
        warn!(selector = %selector.selector, "optional project selector did not match any project");
        Ok(None)
    } else {
        Err(GraphError::selector_not_found(&selector.selector))
    }
}

fn include_also_make(
    projects: Vec<Arc<Project>>,
    graph: &dyn ProjectDependencyGraph,
    make: MakeBehavior,
) -> GraphResult<Vec<Arc<Project>>> {
    if make == MakeBehavior::None {
        return Ok(projects);
    }

    let mut result = projects.clone();
    for project in &projects {
        if make.upstream() {
            result.extend(graph.upstream_projects(&project.id, true)?);
        }
        if make.downstream() {
            result.extend(graph.downstream_projects(&project.id, true)?);
        }
    }
    Ok(result)
}

/// Deduplicate a selection and put it back in build order
fn in_build_order(all: &[Arc<Project>], selection: &[Arc<Project>]) -> Vec<Arc<Project>> {
    let wanted: HashSet<&ProjectId> = selection.iter().map(|p| &p.id).collect();
    all.iter()
        .filter(|p| wanted.contains(&p.id))
        .cloned()
        .collect()
}

fn format_projects(projects: &[Arc<Project>]) -> String {
    projects
        .iter()
        .map(|p| p.id.versionless_key())
        .collect::<Vec<_>>()
        .join(", ")
}
