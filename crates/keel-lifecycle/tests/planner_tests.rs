//! Build planner tests: forks, reports, late binding and direct invocations

use keel_graph::{Project, ProjectId};
use keel_lifecycle::{
    BindingOrigin, BuildPlanner, ExecutionStack, LifecycleBindings, MojoBinding, MojoDescriptor,
    PlanError, PlanStep, PluginDescriptor, PluginLoadError, PluginLoader, StaticBindingSource,
    StaticPluginLoader,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const GROUP: &str = "org.test";

fn app() -> Project {
    Project::new(ProjectId::new(GROUP, "app", "1.0"), "/work/app")
}

fn binding(artifact: &str, goal: &str) -> MojoBinding {
    MojoBinding::new(GROUP, artifact, goal).with_version("1.0")
}

fn plugin(artifact: &str) -> PluginDescriptor {
    PluginDescriptor::new(GROUP, artifact, "1.0")
}

fn tasks(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn labels(steps: &[PlanStep]) -> Vec<String> {
    steps
        .iter()
        .map(|step| match step {
            PlanStep::Execute(b) => b.goal.clone(),
            PlanStep::ResolveLateBound(b) => format!("resolve:{}", b.goal),
            PlanStep::StartFork(b) => format!("start:{}", b.goal),
            PlanStep::EndFork(b) => format!("end:{}", b.goal),
            PlanStep::ClearFork(b) => format!("clear:{}", b.goal),
        })
        .collect()
}

/// Project bindings for `app`, phase by phase
fn declared(entries: &[(&str, MojoBinding)]) -> LifecycleBindings {
    let mut bindings = LifecycleBindings::new();
    for (phase, binding) in entries {
        bindings.add_binding(phase, binding.clone()).unwrap();
    }
    bindings
}

fn planner(loader: StaticPluginLoader, source: StaticBindingSource) -> BuildPlanner {
    let source = Arc::new(source);
    BuildPlanner::new(Arc::new(loader), source.clone(), source)
}

fn source_with(entries: &[(&str, MojoBinding)]) -> StaticBindingSource {
    StaticBindingSource::standard()
        .unwrap()
        .with_project(app().id, declared(entries))
}

fn render(planner: &BuildPlanner, requested: &[&str]) -> Vec<String> {
    let plan = planner.construct_build_plan(&tasks(requested), &app()).unwrap();
    labels(&plan.render_execution_plan(&mut ExecutionStack::new()).unwrap())
}

const TO_TEST: [&str; 5] = ["resources", "compile", "test-resources", "test-compile", "test"];

// ============================================================================
// Lifecycle rendering
// ============================================================================

#[test]
fn test_packaging_bindings_up_to_phase() {
    let planner = planner(StaticPluginLoader::standard(), source_with(&[]));
    let mut expected = TO_TEST.to_vec();
    expected.push("jar");
    assert_eq!(render(&planner, &["package"]), expected);
}

#[test]
fn test_default_bindings_fill_unbound_lifecycles() {
    let planner = planner(StaticPluginLoader::standard(), source_with(&[]));
    assert_eq!(render(&planner, &["clean", "compile"]), vec!["clean", "resources", "compile"]);
}

#[test]
fn test_render_is_idempotent() {
    let planner = planner(StaticPluginLoader::standard(), source_with(&[]));
    let plan = planner.construct_build_plan(&tasks(&["install"]), &app()).unwrap();

    let first = plan.render_execution_plan(&mut ExecutionStack::new()).unwrap();
    let second = plan.render_execution_plan(&mut ExecutionStack::new()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_project_binding_configuration_merged() {
    let source = source_with(&[(
        "compile",
        MojoBinding::new("org.keel.plugins", "keel-compiler-plugin", "compile")
            .with_version("1.0")
            .with_configuration(json!({ "release": "17" })),
    )]);
    let planner = planner(StaticPluginLoader::standard(), source);
    let plan = planner.construct_build_plan(&tasks(&["compile"]), &app()).unwrap();

    let steps = plan.render_execution_plan(&mut ExecutionStack::new()).unwrap();
    assert_eq!(labels(&steps), vec!["resources", "compile"]);
    let compile = steps[1].binding();
    assert_eq!(compile.configuration, json!({ "release": "17" }));
    assert_eq!(compile.origin, Some(BindingOrigin::Project));
}

#[test]
fn test_unknown_packaging_fails() {
    let planner = planner(StaticPluginLoader::standard(), source_with(&[]));
    let war = app().with_packaging("war");
    let result = planner.construct_build_plan(&tasks(&["package"]), &war);
    assert!(matches!(result, Err(PlanError::Bindings { .. })));
}

// ============================================================================
// Forks
// ============================================================================

#[test]
fn test_execute_goal_fork_is_bracketed() {
    let loader = StaticPluginLoader::standard().with_plugin(
        plugin("keel-check-plugin")
            .with_mojo(MojoDescriptor::new("check").with_execute_goal("prepare"))
            .with_mojo(MojoDescriptor::new("prepare")),
    );
    let planner = planner(loader, source_with(&[("verify", binding("keel-check-plugin", "check"))]));

    let mut expected = TO_TEST.to_vec();
    expected.extend(["jar", "start:check", "prepare", "end:check", "check", "clear:check"]);
    assert_eq!(render(&planner, &["verify"]), expected);
}

#[test]
fn test_forked_goal_origin() {
    let loader = StaticPluginLoader::standard().with_plugin(
        plugin("keel-check-plugin")
            .with_mojo(MojoDescriptor::new("check").with_execute_goal("prepare"))
            .with_mojo(MojoDescriptor::new("prepare")),
    );
    let planner = planner(loader, source_with(&[("verify", binding("keel-check-plugin", "check"))]));
    let plan = planner.construct_build_plan(&tasks(&["verify"]), &app()).unwrap();
    let steps = plan.render_execution_plan(&mut ExecutionStack::new()).unwrap();

    let prepare = steps
        .iter()
        .map(PlanStep::binding)
        .find(|b| b.goal == "prepare")
        .unwrap();
    assert_eq!(prepare.origin, Some(BindingOrigin::ForkedGoal));
    assert_eq!(
        prepare.origin_description.as_deref(),
        Some("Forked from: org.test:keel-check-plugin:1.0:check")
    );
}

#[test]
fn test_missing_execute_goal_is_fatal() {
    let loader = StaticPluginLoader::standard().with_plugin(
        plugin("keel-check-plugin").with_mojo(MojoDescriptor::new("check").with_execute_goal("ghost")),
    );
    let planner = planner(loader, source_with(&[("verify", binding("keel-check-plugin", "check"))]));

    let err = planner
        .construct_build_plan(&tasks(&["verify"]), &app())
        .unwrap_err();
    assert_eq!(
        err,
        PlanError::missing_goal("ghost", "org.test:keel-check-plugin:1.0", Some("check"))
    );
}

#[test]
fn test_bound_goal_missing_from_plugin_is_fatal() {
    let loader = StaticPluginLoader::standard().with_plugin(plugin("keel-check-plugin"));
    let planner = planner(loader, source_with(&[("verify", binding("keel-check-plugin", "check"))]));

    let result = planner.construct_build_plan(&tasks(&["verify"]), &app());
    assert!(matches!(result, Err(PlanError::MissingGoal { .. })));
}

#[test]
fn test_execute_phase_fork_renders_phase_copy() {
    let loader = StaticPluginLoader::standard().with_plugin(
        plugin("keel-cover-plugin").with_mojo(MojoDescriptor::new("report").with_execute_phase("test")),
    );
    let planner = planner(loader, source_with(&[("verify", binding("keel-cover-plugin", "report"))]));

    let mut expected = TO_TEST.to_vec();
    expected.push("jar");
    expected.push("start:report");
    expected.extend(TO_TEST);
    expected.extend(["end:report", "report", "clear:report"]);
    assert_eq!(render(&planner, &["verify"]), expected);
}

#[test]
fn test_phase_fork_of_own_phase_does_not_recurse() {
    let loader = StaticPluginLoader::standard().with_plugin(
        plugin("keel-cover-plugin")
            .with_mojo(MojoDescriptor::new("instrument").with_execute_phase("test")),
    );
    let planner = planner(loader, source_with(&[("test", binding("keel-cover-plugin", "instrument"))]));

    let mut expected = TO_TEST.to_vec();
    expected.push("start:instrument");
    expected.extend(TO_TEST);
    expected.extend(["end:instrument", "instrument", "clear:instrument"]);
    assert_eq!(render(&planner, &["test"]), expected);
}

#[test]
fn test_fork_with_empty_content_renders_only_binding() {
    let loader = StaticPluginLoader::standard().with_plugin(
        plugin("keel-cover-plugin").with_mojo(MojoDescriptor::new("early").with_execute_phase("validate")),
    );
    let planner = planner(loader, source_with(&[("initialize", binding("keel-cover-plugin", "early"))]));
    assert_eq!(render(&planner, &["initialize"]), vec!["early"]);
}

#[test]
fn test_mutual_goal_forks_emit_each_key_once() {
    let loader = StaticPluginLoader::standard().with_plugin(
        plugin("keel-loop-plugin")
            .with_mojo(MojoDescriptor::new("ping").with_execute_goal("pong"))
            .with_mojo(MojoDescriptor::new("pong").with_execute_goal("ping")),
    );
    let planner = planner(loader, source_with(&[("validate", binding("keel-loop-plugin", "ping"))]));

    assert_eq!(
        render(&planner, &["validate"]),
        vec!["start:ping", "pong", "end:ping", "ping", "clear:ping"]
    );
}

#[test]
fn test_unknown_execute_phase_is_fatal() {
    let loader = StaticPluginLoader::standard().with_plugin(
        plugin("keel-cover-plugin").with_mojo(MojoDescriptor::new("report").with_execute_phase("tset")),
    );
    let planner = planner(loader, source_with(&[("verify", binding("keel-cover-plugin", "report"))]));

    assert_eq!(
        planner.construct_build_plan(&tasks(&["verify"]), &app()),
        Err(PlanError::unknown_phase("tset"))
    );
}

#[test]
fn test_overlay_lifecycle_applied_to_fork() {
    let cover = plugin("keel-cover-plugin").with_mojo(
        MojoDescriptor::new("instrumented")
            .with_execute_phase("generate-sources")
            .with_execute_lifecycle("cover"),
    );
    let loader = StaticPluginLoader::standard()
        .with_plugin(cover)
        .with_plugin(plugin("keel-gen-plugin").with_mojo(MojoDescriptor::new("generate")));
    let source = source_with(&[("package", binding("keel-cover-plugin", "instrumented"))]).with_overlay(
        "org.test:keel-cover-plugin",
        "cover",
        declared(&[("generate-sources", binding("keel-gen-plugin", "generate"))]),
    );
    let planner = planner(loader, source);

    let mut expected = TO_TEST.to_vec();
    expected.extend([
        "jar",
        "start:instrumented",
        "generate",
        "end:instrumented",
        "instrumented",
        "clear:instrumented",
    ]);
    assert_eq!(render(&planner, &["package"]), expected);
}

#[test]
fn test_missing_overlay_is_fatal() {
    let loader = StaticPluginLoader::standard().with_plugin(
        plugin("keel-cover-plugin").with_mojo(
            MojoDescriptor::new("instrumented")
                .with_execute_phase("compile")
                .with_execute_lifecycle("cover"),
        ),
    );
    let planner = planner(loader, source_with(&[("package", binding("keel-cover-plugin", "instrumented"))]));

    let result = planner.construct_build_plan(&tasks(&["package"]), &app());
    assert!(matches!(result, Err(PlanError::OverlayLoad { lifecycle, .. }) if lifecycle == "cover"));
}

// ============================================================================
// Late binding
// ============================================================================

#[test]
fn test_unloadable_plugin_becomes_late_bound() {
    let planner = planner(
        StaticPluginLoader::standard(),
        source_with(&[("compile", binding("mystery", "run"))]),
    );
    let plan = planner.construct_build_plan(&tasks(&["compile"]), &app()).unwrap();

    assert!(plan.has_late_bound());
    assert_eq!(
        labels(&plan.render_execution_plan(&mut ExecutionStack::new()).unwrap()),
        vec!["resources", "compile", "resolve:run", "run"]
    );
}

#[test]
fn test_late_bound_resolution_registers_declared_fork() {
    let offline = planner(
        StaticPluginLoader::standard(),
        source_with(&[("compile", binding("mystery", "run"))]),
    );
    let mut plan = offline.construct_build_plan(&tasks(&["compile"]), &app()).unwrap();
    let mut stack = ExecutionStack::new();

    let first = plan.render_remaining(&mut stack).unwrap();
    assert_eq!(labels(&first), vec!["resources", "compile", "resolve:run"]);
    let run = first[2].binding().clone();

    let online = planner(
        StaticPluginLoader::standard().with_plugin(
            plugin("mystery")
                .with_mojo(MojoDescriptor::new("run").with_execute_goal("prepare"))
                .with_mojo(MojoDescriptor::new("prepare")),
        ),
        source_with(&[("compile", binding("mystery", "run"))]),
    );
    online.resolve_late_bound(&mut plan, &run, &app()).unwrap();

    assert!(!plan.has_late_bound());
    assert_eq!(
        labels(&plan.render_remaining(&mut stack).unwrap()),
        vec!["start:run", "prepare", "end:run", "run", "clear:run"]
    );
    assert!(plan.render_remaining(&mut stack).unwrap().is_empty());
}

#[test]
fn test_late_bound_resolution_fails_for_missing_goal() {
    let source = || source_with(&[("compile", binding("mystery", "run"))]);
    let mut plan = planner(StaticPluginLoader::standard(), source())
        .construct_build_plan(&tasks(&["compile"]), &app())
        .unwrap();

    let online = planner(
        StaticPluginLoader::standard().with_plugin(plugin("mystery").with_mojo(MojoDescriptor::new("other"))),
        source(),
    );
    let result = online.resolve_late_bound(&mut plan, &binding("mystery", "run"), &app());
    assert!(matches!(result, Err(PlanError::MissingGoal { goal, .. }) if goal == "run"));
}

#[test]
fn test_strict_mode_rejects_unloadable_plugin() {
    let planner = planner(
        StaticPluginLoader::standard(),
        source_with(&[("compile", binding("mystery", "run"))]),
    )
    .with_late_binding(false);

    let result = planner.construct_build_plan(&tasks(&["compile"]), &app());
    assert!(matches!(result, Err(PlanError::PluginResolution { .. })));
}

// ============================================================================
// Reports
// ============================================================================

#[test]
fn test_reports_injected_before_first_consumer_only() {
    let loader = StaticPluginLoader::standard()
        .with_plugin(plugin("keel-info-plugin").with_mojo(MojoDescriptor::new("index")))
        .with_plugin(plugin("keel-audit-plugin").with_mojo(MojoDescriptor::new("audit").requiring_reports()));
    let source = source_with(&[("post-site", binding("keel-audit-plugin", "audit"))])
        .with_reports(app().id, vec![binding("keel-info-plugin", "index")]);
    let planner = planner(loader, source);

    let plan = planner.construct_build_plan(&tasks(&["post-site"]), &app()).unwrap();
    assert!(plan.is_including_reports());

    let steps = plan.render_execution_plan(&mut ExecutionStack::new()).unwrap();
    assert_eq!(
        labels(&steps),
        vec!["start:site", "index", "end:site", "site", "clear:site", "audit"]
    );
    assert_eq!(steps[1].binding().origin, Some(BindingOrigin::Report));
}

#[test]
fn test_no_report_bindings_leaves_consumer_plain() {
    let planner = planner(StaticPluginLoader::standard(), source_with(&[]));
    assert_eq!(render(&planner, &["site"]), vec!["site"]);
}

// ============================================================================
// Direct invocations
// ============================================================================

#[test]
fn test_direct_invocations() {
    let planner = planner(StaticPluginLoader::standard(), source_with(&[]));
    let requested = ["compile", "jar:jar", "org.keel.plugins:keel-clean-plugin:clean"];
    let plan = planner.construct_build_plan(&tasks(&requested), &app()).unwrap();
    let steps = plan.render_execution_plan(&mut ExecutionStack::new()).unwrap();

    assert_eq!(labels(&steps), vec!["resources", "compile", "jar", "clean"]);
    let jar = steps[2].binding();
    assert_eq!(jar.plugin_key(), "org.keel.plugins:keel-jar-plugin:1.0");
    assert_eq!(jar.origin, Some(BindingOrigin::DirectInvocation));
}

#[test]
fn test_invalid_tasks() {
    let planner = planner(StaticPluginLoader::standard(), source_with(&[]));
    for task in ["compiel", "nope:run", "a::b"] {
        let result = planner.construct_build_plan(&tasks(&[task]), &app());
        assert!(matches!(result, Err(PlanError::InvalidTask { .. })), "{task}");
    }
}

// ============================================================================
// Plan cache
// ============================================================================

struct CountingLoader {
    inner: StaticPluginLoader,
    loads: AtomicUsize,
}

impl PluginLoader for CountingLoader {
    fn load_plugin(
        &self,
        binding: &MojoBinding,
        project: &Project,
    ) -> Result<Arc<PluginDescriptor>, PluginLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_plugin(binding, project)
    }

    fn plugin_for_prefix(
        &self,
        prefix: &str,
        project: &Project,
    ) -> Result<Arc<PluginDescriptor>, PluginLoadError> {
        self.inner.plugin_for_prefix(prefix, project)
    }
}

#[test]
fn test_cached_plan_skips_resolved_bindings() {
    let loader = Arc::new(CountingLoader {
        inner: StaticPluginLoader::standard(),
        loads: AtomicUsize::new(0),
    });
    let source = Arc::new(source_with(&[]));
    let planner = BuildPlanner::new(loader.clone(), source.clone(), source);

    planner.construct_build_plan(&tasks(&["compile"]), &app()).unwrap();
    let after_first = loader.loads.load(Ordering::SeqCst);
    assert!(after_first > 0);

    planner.construct_build_plan(&tasks(&["compile"]), &app()).unwrap();
    assert_eq!(loader.loads.load(Ordering::SeqCst), after_first);

    let plan = planner.construct_build_plan(&tasks(&["test"]), &app()).unwrap();
    assert!(loader.loads.load(Ordering::SeqCst) > after_first);
    assert_eq!(plan.tasks().to_vec(), tasks(&["test"]));
}
