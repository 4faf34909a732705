//! Build plan construction
//!
//! The planner merges a project's binding layers into a [`BuildPlan`], resolves
//! direct goal invocations, and walks the plan once to discover forked
//! executions and report injections. Plugins that fail to load become
//! late-bound unless late binding is disabled.
use crate::binding::{BindingOrigin, MojoBinding};
use crate::descriptor::{MojoDescriptor, PluginDescriptor};
use crate::error::{PlanError, PlanResult};
use crate::lifecycle::{is_valid_phase, merge_bindings, MergePolicy};
use crate::plan::{BuildPlan, Fork};
use crate::source::{LifecycleBindingSource, PluginLoader, ReportBindingProvider};
use keel_graph::{Project, ProjectId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub struct BuildPlanner {
    loader: Arc<dyn PluginLoader>,
    bindings: Arc<dyn LifecycleBindingSource>,
    reports: Arc<dyn ReportBindingProvider>,
    allow_late_binding: bool,
    cache: Mutex<HashMap<ProjectId, BuildPlan>>,
}

impl BuildPlanner {
    pub fn new(
        loader: Arc<dyn PluginLoader>,
        bindings: Arc<dyn LifecycleBindingSource>,
        reports: Arc<dyn ReportBindingProvider>,
    ) -> Self {
        Self {
            loader,
            bindings,
            reports,
            allow_late_binding: true,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// With late binding disabled a plugin load failure fails the plan
    pub fn with_late_binding(mut self, allow: bool) -> Self {
        self.allow_late_binding = allow;
        self
    }

    pub fn loader(&self) -> &Arc<dyn PluginLoader> {
        &self.loader
    }

    /// Build the plan for `tasks` on one project
    ///
    /// The first plan of a project is cached; later calls copy it with the
    /// new tasks and only inspect bindings it has not resolved yet.
    pub fn construct_build_plan(&self, tasks: &[String], project: &Project) -> PlanResult<BuildPlan> {
        let cached = self
            .cache
            .lock()
            .map_err(|_| PlanError::Poisoned)?
            .get(&project.id)
            .map(|plan| plan.copy(tasks.to_vec()));
        let fresh = cached.is_none();

        let mut plan = match cached {
            Some(plan) => plan,
            None => self.assemble(tasks, project)?,
        };

        self.initialize_direct_invocations(&mut plan, project)?;
        self.add_forked_lifecycle_modifiers(&mut plan, project, &mut Vec::new())?;
        self.add_reporting_lifecycle_modifiers(&mut plan, project)?;
        plan.mark_fully_resolved()?;

        if fresh {
            self.cache
                .lock()
                .map_err(|_| PlanError::Poisoned)?
                .insert(project.id.clone(), plan.copy(Vec::new()));
        }
        debug!(project = %project.id, tasks = ?tasks, "build plan constructed");
        Ok(plan)
    }

    /// Load the plugin of a late-bound binding while the plan executes
    ///
    /// On success the binding is no longer late-bound and any fork its mojo
    /// declares is registered on the plan.
    pub fn resolve_late_bound(
        &self,
        plan: &mut BuildPlan,
        binding: &MojoBinding,
        project: &Project,
    ) -> PlanResult<()> {
        let plugin = self
            .loader
            .load_plugin(binding, project)
            .map_err(|e| PlanError::PluginResolution {
                binding: binding.to_string(),
                reason: e.to_string(),
            })?;
        plan.clear_late_bound(binding);
        self.find_fork_modifiers(binding, &plugin, plan, project, &mut Vec::new())?;
        debug!(project = %project.id, mojo = %binding, "late-bound mojo resolved");
        Ok(())
    }

    /// Merge project, packaging and default bindings, in that precedence
    fn assemble(&self, tasks: &[String], project: &Project) -> PlanResult<BuildPlan> {
        let mut defaults = self.bindings.default_bindings(project)?;
        defaults.set_origin(BindingOrigin::Default);

        let mut packaging = self.bindings.packaging_bindings(project)?;
        packaging.set_origin(BindingOrigin::Packaging);

        let mut declared = self.bindings.project_bindings(project)?;
        declared.set_origin(BindingOrigin::Project);

        for (phase, binding) in declared.iter().filter(|(_, b)| b.version.is_none()) {
            warn!(
                project = %project.id,
                plugin = %binding.plugin_key(),
                phase,
                "no version specified for plugin; builds may not be reproducible"
            );
        }

        let merged = merge_bindings(&packaging, &declared, Some(&defaults), MergePolicy::NewDominant);
        Ok(BuildPlan::new(merged, tasks.to_vec()))
    }

    fn initialize_direct_invocations(&self, plan: &mut BuildPlan, project: &Project) -> PlanResult<()> {
        for task in plan.tasks().to_vec() {
            if is_valid_phase(&task) || plan.direct_invocation(&task).is_some() {
                continue;
            }

            let mut binding = self
                .parse_task(&task, project)?
                .with_origin(BindingOrigin::DirectInvocation)
                .with_origin_description(format!("Original reference from user: {task}"));

            if let Some(declared) = plan.bindings().find_matching(&binding, false) {
                binding.configuration = declared.configuration.clone();
                if binding.version.is_none() {
                    binding.version = declared.version.clone();
                }
            }
            plan.add_direct_invocation(task, binding);
        }
        Ok(())
    }

    /// Parse `group:artifact[:version]:goal` or `prefix:goal`
    pub fn parse_task(&self, task: &str, project: &Project) -> PlanResult<MojoBinding> {
        let parts: Vec<&str> = task.split(':').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(PlanError::invalid_task(task, "empty task segment"));
        }

        match parts.as_slice() {
            [group, artifact, version, goal] => {
                Ok(MojoBinding::new(*group, *artifact, *goal).with_version(*version))
            }
            [group, artifact, goal] => Ok(MojoBinding::new(*group, *artifact, *goal)),
            [prefix, goal] => {
                let plugin = self
                    .loader
                    .plugin_for_prefix(prefix, project)
                    .map_err(|e| PlanError::invalid_task(task, e.to_string()))?;
                Ok(MojoBinding::new(&plugin.group_id, &plugin.artifact_id, *goal)
                    .with_version(&plugin.version))
            }
            _ => Err(PlanError::invalid_task(
                task,
                "not a lifecycle phase; expected group:artifact[:version]:goal or prefix:goal",
            )),
        }
    }

    fn add_forked_lifecycle_modifiers(
        &self,
        plan: &mut BuildPlan,
        project: &Project,
        call_stack: &mut Vec<MojoBinding>,
    ) -> PlanResult<()> {
        for binding in plan.planned_bindings()? {
            if plan.is_fully_resolved(&binding) || call_stack.iter().any(|b| b.key() == binding.key()) {
                continue;
            }
            let Some(plugin) = self.load_descriptor(&binding, plan, project)? else {
                continue;
            };
            self.find_fork_modifiers(&binding, &plugin, plan, project, call_stack)?;
        }
        Ok(())
    }

    fn find_fork_modifiers(
        &self,
        binding: &MojoBinding,
        plugin: &PluginDescriptor,
        plan: &mut BuildPlan,
        project: &Project,
        call_stack: &mut Vec<MojoBinding>,
    ) -> PlanResult<()> {
        let mojo = plugin
            .mojo(&binding.goal)
            .ok_or_else(|| PlanError::missing_goal(&binding.goal, plugin.id(), None))?;

        if let Some(goal) = &mojo.execute_goal {
            self.add_goal_fork(binding, plugin, goal, plan)
        } else if let Some(phase) = &mojo.execute_phase {
            call_stack.push(binding.clone());
            let result = self.add_phase_fork(binding, plugin, mojo, phase, plan, project, call_stack);
            call_stack.pop();
            result
        } else {
            Ok(())
        }
    }

    fn add_goal_fork(
        &self,
        binding: &MojoBinding,
        plugin: &PluginDescriptor,
        goal: &str,
        plan: &mut BuildPlan,
    ) -> PlanResult<()> {
        if plugin.mojo(goal).is_none() {
            return Err(PlanError::missing_goal(goal, plugin.id(), Some(&binding.goal)));
        }

        let forked = MojoBinding::new(&plugin.group_id, &plugin.artifact_id, goal)
            .with_version(&plugin.version)
            .with_origin(BindingOrigin::ForkedGoal)
            .with_origin_description(format!("Forked from: {binding}"));
        debug!(binding = %binding, forked = %forked, "registering single goal fork");
        plan.add_fork(binding, Fork::SingleGoal(vec![forked]));
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_phase_fork(
        &self,
        binding: &MojoBinding,
        plugin: &PluginDescriptor,
        mojo: &MojoDescriptor,
        phase: &str,
        plan: &mut BuildPlan,
        project: &Project,
        call_stack: &mut Vec<MojoBinding>,
    ) -> PlanResult<()> {
        if !is_valid_phase(phase) {
            return Err(PlanError::unknown_phase(phase));
        }

        let mut forked = plan.copy_for_phase(phase);
        forked.remove_bindings(call_stack);

        if let Some(lifecycle) = &mojo.execute_lifecycle {
            let overlay = self
                .bindings
                .lifecycle_overlay(plugin, lifecycle, project)
                .map_err(|e| PlanError::OverlayLoad {
                    lifecycle: lifecycle.clone(),
                    reason: e.to_string(),
                })?;
            forked.add_lifecycle_overlay(&overlay);
        }

        self.add_forked_lifecycle_modifiers(&mut forked, project, call_stack)?;
        debug!(binding = %binding, phase, "registering forked phase");
        plan.add_fork(binding, Fork::Phase(Box::new(forked)));
        Ok(())
    }

    /// Inject report bindings ahead of the first goal that needs reports
    fn add_reporting_lifecycle_modifiers(&self, plan: &mut BuildPlan, project: &Project) -> PlanResult<()> {
        if plan.is_including_reports() {
            debug!(project = %project.id, "report modifiers already present in the build plan");
            return Ok(());
        }

        for binding in plan.planned_bindings()? {
            if plan.is_fully_resolved(&binding) {
                continue;
            }
            let Some(plugin) = self.load_descriptor(&binding, plan, project)? else {
                debug!(binding = %binding, "no plugin descriptor, skipping report discovery");
                continue;
            };
            let mojo = plugin
                .mojo(&binding.goal)
                .ok_or_else(|| PlanError::missing_goal(&binding.goal, plugin.id(), None))?;
            if !mojo.requires_reports {
                continue;
            }

            debug!(binding = %binding, "goal requires reports, running report discovery");
            let reports: Vec<MojoBinding> = self
                .reports
                .report_bindings(project)?
                .into_iter()
                .map(|mut report| {
                    report.origin.get_or_insert(BindingOrigin::Report);
                    report
                })
                .collect();

            if !reports.is_empty() {
                plan.add_fork(&binding, Fork::SingleGoal(reports.clone()));
                for report in &reports {
                    if plan.is_fully_resolved(report) {
                        continue;
                    }
                    if let Some(descriptor) = self.load_descriptor(report, plan, project)? {
                        self.find_fork_modifiers(report, &descriptor, plan, project, &mut Vec::new())?;
                    }
                }
            }

            plan.mark_including_reports();
            break;
        }
        Ok(())
    }

    fn load_descriptor(
        &self,
        binding: &MojoBinding,
        plan: &mut BuildPlan,
        project: &Project,
    ) -> PlanResult<Option<Arc<PluginDescriptor>>> {
        match self.loader.load_plugin(binding, project) {
            Ok(plugin) => Ok(Some(plugin)),
            Err(err) if self.allow_late_binding => {
                warn!(
                    plugin = %binding.plugin_key(),
                    "failed to load plugin, adding to late-bound plugins"
                );
                debug!(binding = %binding, error = %err, "late-bound plugin cause");
                plan.add_late_bound(binding);
                Ok(None)
            }
            Err(err) => Err(PlanError::PluginResolution {
                binding: binding.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for BuildPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPlanner")
            .field("allow_late_binding", &self.allow_late_binding)
            .finish_non_exhaustive()
    }
}
