//! Reactor build orchestration
//!
//! Tasks are split into segments; each segment is run over the reactor in
//! build order, sequentially or on a worker pool that releases projects as
//! their upstream projects finish.
use crate::error::{BuildError, BuildResult};
use crate::executor::MojoExecutor;
use crate::resume::ResumptionData;
use crate::segment::{calculate_task_segments, project_segments, ProjectSegment};
use crate::status::ReactorBuildStatus;
use crate::summary::{BuildSummary, ProjectStatus};
use keel_config::{Config, FailMode};
use keel_graph::{ConcurrencyDependencyGraph, Project, ProjectDependencyGraph, ScheduledUnit};
use keel_lifecycle::{BuildPlanner, ExecutionStack, MojoBinding, PlanError, PlanStep};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why a project stopped
#[derive(Debug)]
struct ProjectFailure {
    goal: Option<String>,
    message: String,
}

impl ProjectFailure {
    fn planning(error: PlanError) -> Self {
        Self {
            goal: None,
            message: error.to_string(),
        }
    }

    fn at(binding: &MojoBinding, message: impl Into<String>) -> Self {
        Self {
            goal: Some(binding.to_string()),
            message: message.into(),
        }
    }
}

/// Runs the requested tasks over a reactor graph
pub struct ReactorBuilder {
    planner: Arc<BuildPlanner>,
    executor: Arc<dyn MojoExecutor>,
    threads: usize,
    fail_mode: FailMode,
    /// Where resumption data is kept; `None` disables it
    resume_root: Option<PathBuf>,
}

impl ReactorBuilder {
    /// Single-threaded, fail-fast builder
    pub fn new(planner: Arc<BuildPlanner>, executor: Arc<dyn MojoExecutor>) -> Self {
        Self {
            planner,
            executor,
            threads: 1,
            fail_mode: FailMode::FailFast,
            resume_root: None,
        }
    }

    /// Take threads, fail mode and project root from configuration
    pub fn from_config(
        config: &Config,
        planner: Arc<BuildPlanner>,
        executor: Arc<dyn MojoExecutor>,
    ) -> BuildResult<Self> {
        let mut builder = Self::new(planner, executor)
            .with_threads(config.threads()?)
            .with_fail_mode(config.fail_mode());
        builder.resume_root = config.project_root().map(Path::to_path_buf);
        Ok(builder)
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_fail_mode(mut self, fail_mode: FailMode) -> Self {
        self.fail_mode = fail_mode;
        self
    }

    pub fn with_resume_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.resume_root = Some(root.into());
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Build every task segment over the graph's active projects
    ///
    /// Project failures are reported in the summary, not as an error.
    pub fn build(
        &self,
        graph: &dyn ProjectDependencyGraph,
        tasks: &[String],
    ) -> BuildResult<BuildSummary> {
        if tasks.is_empty() {
            return Err(BuildError::NoGoals);
        }

        let started = Instant::now();
        let sorted = graph.sorted_projects();
        let mut summary = BuildSummary::new(self.fail_mode);

        let Some(root) = sorted
            .iter()
            .find(|p| p.execution_root)
            .or_else(|| sorted.first())
            .cloned()
        else {
            return Ok(summary);
        };

        let segments = calculate_task_segments(tasks, &self.planner, &root)?;
        if segments.iter().any(|s| !s.aggregating) {
            for project in &sorted {
                summary.register(&project.id, &project.name);
            }
        } else {
            summary.register(&root.id, &root.name);
        }

        let status = ReactorBuildStatus::new(self.fail_mode);
        for segment in &segments {
            let units = project_segments(segment, &sorted);
            info!(
                segment = %segment,
                projects = units.len(),
                threads = self.threads,
                "building task segment"
            );

            if self.threads > 1 && units.len() > 1 {
                self.build_concurrent(graph, units, &status, &mut summary)?;
            } else {
                self.build_sequential(graph, units, &status, &mut summary)?;
            }
        }

        summary.set_total(started.elapsed());
        self.update_resumption_data(&summary)?;
        summary.log();
        Ok(summary)
    }

    fn build_sequential(
        &self,
        graph: &dyn ProjectDependencyGraph,
        units: Vec<ProjectSegment>,
        status: &ReactorBuildStatus,
        summary: &mut BuildSummary,
    ) -> BuildResult<()> {
        for unit in &units {
            let (outcome, duration) = self.run_unit(unit, graph, status)?;
            summary.record(&unit.project.id, &unit.project.name, outcome, duration);
        }
        Ok(())
    }

    /// Worker-pool build; the calling thread collects completions and
    /// dispatches the units each completion releases
    fn build_concurrent(
        &self,
        graph: &dyn ProjectDependencyGraph,
        units: Vec<ProjectSegment>,
        status: &ReactorBuildStatus,
        summary: &mut BuildSummary,
    ) -> BuildResult<()> {
        let scheduler = ConcurrencyDependencyGraph::new(graph, units)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("keel-builder-{i}"))
            .build()
            .map_err(|e| BuildError::ThreadPool(e.to_string()))?;

        let total = scheduler.len();
        let (tx, rx) = mpsc::channel::<(Arc<ProjectSegment>, BuildResult<(ProjectStatus, Duration)>)>();

        pool.in_place_scope(|scope| -> BuildResult<()> {
            let dispatch = |unit: Arc<ProjectSegment>| {
                let tx = tx.clone();
                debug!(project = %unit.project_id(), "dispatching");
                scope.spawn(move |_| {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        self.run_unit(&unit, graph, status)
                    }))
                    .unwrap_or(Err(BuildError::WorkerLost));
                    // The receiver only goes away once the build is aborted
                    let _ = tx.send((unit, result));
                });
            };

            for unit in scheduler.root_schedulable_units() {
                dispatch(unit);
            }

            let mut finished = 0;
            while finished < total {
                let (unit, result) = rx.recv().map_err(|_| BuildError::WorkerLost)?;
                finished += 1;

                let (outcome, duration) = result?;
                summary.record(&unit.project.id, &unit.project.name, outcome, duration);

                for released in scheduler.mark_finished(unit.project_id())? {
                    dispatch(released);
                }
            }
            Ok(())
        })
    }

    /// Build one project, or skip it when the fail mode says so
    fn run_unit(
        &self,
        unit: &ProjectSegment,
        graph: &dyn ProjectDependencyGraph,
        status: &ReactorBuildStatus,
    ) -> BuildResult<(ProjectStatus, Duration)> {
        let id = &unit.project.id;
        if status.should_skip(id)? {
            info!(project = %id, "skipped");
            return Ok((ProjectStatus::Skipped, Duration::ZERO));
        }

        info!(project = %id, tasks = ?unit.tasks, "building");
        let started = Instant::now();
        let outcome = match self.build_project(&unit.project, &unit.tasks) {
            Ok(()) => ProjectStatus::Success,
            Err(failure) => {
                warn!(
                    project = %id,
                    goal = failure.goal.as_deref().unwrap_or("<planning>"),
                    message = %failure.message,
                    "project failed"
                );
                status.record_failure(id, graph)?;
                ProjectStatus::Failed {
                    goal: failure.goal,
                    message: failure.message,
                }
            }
        };

        let duration = started.elapsed();
        info!(project = %id, duration = ?duration, "finished");
        Ok((outcome, duration))
    }

    /// Execute a project's plan, rendering it again after each late-bound
    /// resolution so forks declared by the resolved mojo are honored
    fn build_project(&self, project: &Project, tasks: &[String]) -> Result<(), ProjectFailure> {
        let mut plan = self
            .planner
            .construct_build_plan(tasks, project)
            .map_err(ProjectFailure::planning)?;
        let mut stack = ExecutionStack::new();

        loop {
            let steps = plan
                .render_remaining(&mut stack)
                .map_err(ProjectFailure::planning)?;
            if steps.is_empty() {
                return Ok(());
            }

            for step in &steps {
                match step {
                    PlanStep::ResolveLateBound(binding) => self
                        .planner
                        .resolve_late_bound(&mut plan, binding, project)
                        .map_err(|e| ProjectFailure::at(binding, e.to_string()))?,
                    PlanStep::Execute(binding) => self
                        .executor
                        .execute(project, binding)
                        .map_err(|e| ProjectFailure::at(binding, e.message))?,
                    PlanStep::StartFork(binding) => {
                        debug!(project = %project.id, mojo = %binding, "forked execution starting")
                    }
                    PlanStep::EndFork(binding) => {
                        debug!(project = %project.id, mojo = %binding, "forked execution finished")
                    }
                    PlanStep::ClearFork(binding) => {
                        debug!(project = %project.id, mojo = %binding, "forked execution cleared")
                    }
                }
            }
        }
    }

    fn update_resumption_data(&self, summary: &BuildSummary) -> BuildResult<()> {
        let Some(root) = &self.resume_root else {
            return Ok(());
        };
        match ResumptionData::from_summary(summary) {
            Some(data) => data.persist(root),
            None => ResumptionData::remove(root),
        }
    }
}

impl std::fmt::Debug for ReactorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorBuilder")
            .field("threads", &self.threads)
            .field("fail_mode", &self.fail_mode)
            .field("resume_root", &self.resume_root)
            .finish_non_exhaustive()
    }
}
