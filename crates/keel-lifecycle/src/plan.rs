//! Build plans
//!
//! A plan holds one project's merged lifecycle bindings, the requested tasks
//! and the forks discovered by the planner. Rendering turns it into the
//! ordered list of steps the executor runs: goal executions plus the marker
//! steps that bracket forked executions and trigger late plugin resolution.
use crate::binding::{BindingKey, BindingOrigin, MojoBinding};
use crate::error::{PlanError, PlanResult};
use crate::lifecycle::{is_valid_phase, merge_bindings, LifecycleBindings, MergePolicy};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Executions run ahead of a forking binding
#[derive(Debug, Clone, PartialEq)]
pub enum Fork {
    None,
    /// Flat list of goals, from an execute-goal or report injection
    SingleGoal(Vec<MojoBinding>),
    /// A copy of the plan restricted to one phase
    Phase(Box<BuildPlan>),
}

static NO_FORK: Fork = Fork::None;

/// One entry of a rendered plan
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Execute(MojoBinding),
    /// Resolve the plugin of the wrapped binding before running it
    ResolveLateBound(MojoBinding),
    /// Forked executions for the wrapped binding start here
    StartFork(MojoBinding),
    EndFork(MojoBinding),
    /// Drop the forked execution state once the forking binding ran
    ClearFork(MojoBinding),
}

impl PlanStep {
    pub fn binding(&self) -> &MojoBinding {
        match self {
            PlanStep::Execute(b)
            | PlanStep::ResolveLateBound(b)
            | PlanStep::StartFork(b)
            | PlanStep::EndFork(b)
            | PlanStep::ClearFork(b) => b,
        }
    }

    pub fn is_marker(&self) -> bool {
        !matches!(self, PlanStep::Execute(_))
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::Execute(b) => write!(f, "{b}"),
            PlanStep::ResolveLateBound(b) => write!(f, "[resolve late-bound] {b}"),
            PlanStep::StartFork(b) => write!(f, "[start fork] {b}"),
            PlanStep::EndFork(b) => write!(f, "[end fork] {b}"),
            PlanStep::ClearFork(b) => write!(f, "[clear fork] {b}"),
        }
    }
}

/// Keys of the bindings whose forks are being rendered
#[derive(Debug, Clone, Default)]
pub struct ExecutionStack {
    keys: Vec<BindingKey>,
}

impl ExecutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: BindingKey) {
        self.keys.push(key);
    }

    pub fn pop(&mut self) -> Option<BindingKey> {
        self.keys.pop()
    }

    pub fn contains(&self, key: &BindingKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildPlan {
    bindings: LifecycleBindings,
    tasks: Vec<String>,
    direct_invocations: HashMap<String, MojoBinding>,
    forks: HashMap<BindingKey, Fork>,
    late_bound: HashSet<BindingKey>,
    fully_resolved: HashSet<BindingKey>,
    /// What `render_remaining` already handed out
    progress: RenderProgress,
    including_reports: bool,
}

/// Rendering position of a live execution loop
#[derive(Debug, Clone, Default, PartialEq)]
struct RenderProgress {
    /// Tasks rendered completely
    tasks_done: usize,
    /// Lifecycle bindings rendered so far
    bindings: HashSet<BindingKey>,
}

impl BuildPlan {
    pub fn new(bindings: LifecycleBindings, tasks: Vec<String>) -> Self {
        Self {
            bindings,
            tasks,
            direct_invocations: HashMap::new(),
            forks: HashMap::new(),
            late_bound: HashSet::new(),
            fully_resolved: HashSet::new(),
            progress: RenderProgress::default(),
            including_reports: false,
        }
    }

    pub fn bindings(&self) -> &LifecycleBindings {
        &self.bindings
    }

    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    /// Same bindings and forks for a different task list, with fresh progress
    pub fn copy(&self, tasks: Vec<String>) -> Self {
        Self {
            tasks,
            progress: RenderProgress::default(),
            ..self.clone()
        }
    }

    pub fn copy_for_phase(&self, phase: &str) -> Self {
        self.copy(vec![phase.to_string()])
    }

    pub fn add_direct_invocation(&mut self, task: impl Into<String>, binding: MojoBinding) {
        self.direct_invocations.insert(task.into(), binding);
    }

    pub fn direct_invocation(&self, task: &str) -> Option<&MojoBinding> {
        self.direct_invocations.get(task)
    }

    /// Register executions to run ahead of `forking`
    ///
    /// Goal lists accumulate on an existing goal-list fork; anything else
    /// replaces the previous fork.
    pub fn add_fork(&mut self, forking: &MojoBinding, fork: Fork) {
        let key = forking.key();
        if let Fork::SingleGoal(more) = &fork {
            if let Some(Fork::SingleGoal(existing)) = self.forks.get_mut(&key) {
                existing.extend(more.iter().cloned());
                return;
            }
        }
        if self.forks.contains_key(&key) {
            debug!(binding = %forking, "replacing previously registered fork");
        }
        self.forks.insert(key, fork);
    }

    pub fn fork(&self, key: &BindingKey) -> &Fork {
        self.forks.get(key).unwrap_or(&NO_FORK)
    }

    pub fn add_late_bound(&mut self, binding: &MojoBinding) {
        self.late_bound.insert(binding.key());
    }

    /// The binding's plugin was loaded after planning
    pub fn clear_late_bound(&mut self, binding: &MojoBinding) {
        self.late_bound.remove(&binding.key());
    }

    pub fn is_late_bound(&self, binding: &MojoBinding) -> bool {
        self.late_bound.contains(&binding.key())
    }

    pub fn has_late_bound(&self) -> bool {
        !self.late_bound.is_empty()
    }

    /// Record every binding the plan currently renders as resolved
    pub fn mark_fully_resolved(&mut self) -> PlanResult<()> {
        let keys: Vec<BindingKey> = self
            .planned_bindings()?
            .iter()
            .map(MojoBinding::key)
            .collect();
        self.fully_resolved.extend(keys);
        Ok(())
    }

    pub fn is_fully_resolved(&self, binding: &MojoBinding) -> bool {
        self.fully_resolved.contains(&binding.key())
    }

    pub fn mark_including_reports(&mut self) {
        self.including_reports = true;
    }

    pub fn is_including_reports(&self) -> bool {
        self.including_reports
    }

    /// Drop bindings matching any of `bindings` by group, artifact and goal
    pub fn remove_bindings(&mut self, bindings: &[MojoBinding]) {
        self.bindings.remove_bindings(bindings, false);
    }

    /// Merge a plugin lifecycle overlay into the plan, overlay configuration dominant
    pub fn add_lifecycle_overlay(&mut self, overlay: &LifecycleBindings) {
        let mut overlay = overlay.clone();
        overlay.set_origin(BindingOrigin::Overlay);
        self.bindings = merge_bindings(&self.bindings, &overlay, None, MergePolicy::NewDominant);
    }

    /// Render the plan from scratch
    ///
    /// Does not touch the plan's progress, so repeated calls with an empty
    /// stack return the same steps.
    pub fn render_execution_plan(&self, stack: &mut ExecutionStack) -> PlanResult<Vec<PlanStep>> {
        self.render_with(stack, &mut RenderProgress::default(), false)
    }

    /// Render what earlier calls have not handed out yet
    ///
    /// Stops after the resolve marker of a late-bound task binding. Once the
    /// caller has resolved it (see [`BuildPlan::clear_late_bound`]) the next
    /// call renders that binding with whatever forks were registered since.
    /// An empty result means the plan is exhausted.
    pub fn render_remaining(&mut self, stack: &mut ExecutionStack) -> PlanResult<Vec<PlanStep>> {
        let mut progress = std::mem::take(&mut self.progress);
        let steps = self.render_with(stack, &mut progress, true);
        self.progress = progress;
        steps
    }

    pub fn reset_execution_progress(&mut self) {
        self.progress = RenderProgress::default();
    }

    /// Distinct goal executions of a fresh render, in order
    pub fn planned_bindings(&self) -> PlanResult<Vec<MojoBinding>> {
        let steps = self.render_execution_plan(&mut ExecutionStack::new())?;
        let mut seen = HashSet::new();
        Ok(steps
            .into_iter()
            .filter_map(|step| match step {
                PlanStep::Execute(binding) => Some(binding),
                _ => None,
            })
            .filter(|binding| seen.insert(binding.key()))
            .collect())
    }

    fn render_with(
        &self,
        stack: &mut ExecutionStack,
        progress: &mut RenderProgress,
        stop_at_late_bound: bool,
    ) -> PlanResult<Vec<PlanStep>> {
        let mut steps = Vec::new();
        for task in self.tasks.iter().skip(progress.tasks_done) {
            let phase = is_valid_phase(task);
            for binding in self.task_bindings(task)? {
                let key = binding.key();
                if phase && progress.bindings.contains(&key) {
                    continue;
                }
                if stop_at_late_bound && self.late_bound.contains(&key) {
                    steps.push(PlanStep::ResolveLateBound(binding));
                    return Ok(steps);
                }
                self.render_binding(&binding, stack, &mut steps)?;
                if phase {
                    progress.bindings.insert(key);
                }
            }
            progress.tasks_done += 1;
        }
        Ok(steps)
    }

    fn task_bindings(&self, task: &str) -> PlanResult<Vec<MojoBinding>> {
        if is_valid_phase(task) {
            return self.bindings.bindings_up_to(task);
        }
        let binding = self.direct_invocations.get(task).ok_or_else(|| {
            PlanError::invalid_task(task, "not a lifecycle phase or a resolved goal")
        })?;
        Ok(vec![binding.clone()])
    }

    fn render_binding(
        &self,
        binding: &MojoBinding,
        stack: &mut ExecutionStack,
        steps: &mut Vec<PlanStep>,
    ) -> PlanResult<()> {
        let key = binding.key();
        if stack.contains(&key) {
            debug!(binding = %binding, "binding already executing in this fork chain, skipping");
            return Ok(());
        }

        if self.late_bound.contains(&key) {
            steps.push(PlanStep::ResolveLateBound(binding.clone()));
        }

        let fork = self.fork(&key);
        if matches!(fork, Fork::None) {
            steps.push(PlanStep::Execute(binding.clone()));
            return Ok(());
        }

        stack.push(key);
        let forked = self.render_fork(fork, stack);
        stack.pop();
        let forked = forked?;

        if forked.is_empty() {
            steps.push(PlanStep::Execute(binding.clone()));
        } else {
            steps.push(PlanStep::StartFork(binding.clone()));
            steps.extend(forked);
            steps.push(PlanStep::EndFork(binding.clone()));
            steps.push(PlanStep::Execute(binding.clone()));
            steps.push(PlanStep::ClearFork(binding.clone()));
        }
        Ok(())
    }

    fn render_fork(&self, fork: &Fork, stack: &mut ExecutionStack) -> PlanResult<Vec<PlanStep>> {
        match fork {
            Fork::None => Ok(Vec::new()),
            Fork::SingleGoal(bindings) => {
                let mut steps = Vec::new();
                for binding in bindings {
                    self.render_binding(binding, stack, &mut steps)?;
                }
                Ok(steps)
            }
            Fork::Phase(plan) => plan.render_with(stack, &mut RenderProgress::default(), false),
        }
    }
}
