//! Reactor selection pipeline tests

use keel_graph::{
    GraphBuilder, GraphError, ModelProblem, Project, ProjectActivation, ProjectCollection,
    ProjectCollector, ProjectDependencyGraph, ProjectId, ProjectRef, ProjectSelector,
    ReactorGraph, ReactorRequest, StaticProjectCollector,
};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::sync::Arc;

const ROOT: &str = "/work/reactor";

fn id(artifact: &str) -> ProjectId {
    ProjectId::new("org.test", artifact, "1.0")
}

fn project(artifact: &str, deps: &[&str]) -> Project {
    Project::new(id(artifact), format!("{ROOT}/{artifact}"))
        .with_dependencies(deps.iter().map(|d| ProjectRef::new("org.test", *d)).collect())
}

fn names(graph: &ReactorGraph) -> Vec<String> {
    graph
        .sorted_projects()
        .iter()
        .map(|p| p.id.artifact_id.clone())
        .collect()
}

/// api <- core <- { web, cli }; web <- app; tools is standalone
#[fixture]
fn reactor() -> Vec<Project> {
    vec![
        project("app", &["web"]),
        project("api", &[]),
        project("core", &["api"]),
        project("web", &["core"]),
        project("cli", &["core"]),
        project("tools", &[]),
    ]
}

fn request() -> ReactorRequest {
    ReactorRequest::new().with_base_directory(ROOT)
}

fn build(projects: Vec<Project>, request: &ReactorRequest) -> Result<ReactorGraph, GraphError> {
    GraphBuilder::new().build_from_projects(projects, request)
}

// ============================================================================
// Selection
// ============================================================================

#[rstest]
fn test_no_selection_builds_everything(reactor: Vec<Project>) {
    let graph = build(reactor, &request()).unwrap();

    assert!(!graph.is_filtered());
    assert_eq!(
        names(&graph),
        vec!["api", "core", "web", "app", "cli", "tools"]
    );
}

#[rstest]
fn test_base_directory_limits_default_selection(reactor: Vec<Project>) {
    let request = ReactorRequest::new().with_base_directory(format!("{ROOT}/core"));
    let graph = build(reactor, &request).unwrap();

    assert!(graph.is_filtered());
    assert_eq!(names(&graph), vec!["core"]);
}

#[rstest]
#[case(":web")]
#[case("org.test:web")]
#[case("web")]
#[case("./web")]
fn test_single_selector_forms(reactor: Vec<Project>, #[case] selector: &str) {
    let request = request().with_activation(ProjectActivation::parse([selector]));
    let graph = build(reactor, &request).unwrap();
    assert_eq!(names(&graph), vec!["web"]);
}

#[rstest]
fn test_selected_projects_come_back_in_build_order(reactor: Vec<Project>) {
    let request = request().with_activation(ProjectActivation::parse([":cli", ":api"]));
    let graph = build(reactor, &request).unwrap();
    assert_eq!(names(&graph), vec!["api", "cli"]);
}

#[rstest]
fn test_unmatched_selector_fails(reactor: Vec<Project>) {
    let request = request().with_activation(ProjectActivation::parse([":web", ":nope"]));
    let result = build(reactor, &request);
    assert_eq!(
        result.unwrap_err(),
        GraphError::SelectorNotFound {
            selector: ":nope".to_string()
        }
    );
}

#[rstest]
fn test_unmatched_optional_selector_is_skipped(reactor: Vec<Project>) {
    let request = request().with_activation(ProjectActivation::parse([":web", "?:nope"]));
    let graph = build(reactor, &request).unwrap();
    assert_eq!(names(&graph), vec!["web"]);
}

#[rstest]
fn test_optional_selectors_matching_nothing_fail(reactor: Vec<Project>) {
    let request = request().with_activation(ProjectActivation::parse(["?:nope", "?:gone"]));
    let result = build(reactor, &request);
    assert_eq!(
        result.unwrap_err(),
        GraphError::NoProjectsSelected {
            selectors: vec![":nope".to_string(), ":gone".to_string()]
        }
    );
}

// ============================================================================
// Also-make
// ============================================================================

#[rstest]
#[case("upstream", vec!["api", "core", "web"])]
#[case("downstream", vec!["web", "app"])]
#[case("both", vec!["api", "core", "web", "app"])]
fn test_make_behaviors(
    reactor: Vec<Project>,
    #[case] behavior: &str,
    #[case] expected: Vec<&str>,
) {
    let request = request()
        .with_activation(ProjectActivation::parse([":web"]))
        .with_make_behavior(behavior);
    let graph = build(reactor, &request).unwrap();
    assert_eq!(names(&graph), expected);
}

#[rstest]
fn test_invalid_make_behavior_rejected(reactor: Vec<Project>) {
    let request = request().with_make_behavior("sideways");
    let result = build(reactor, &request);
    assert!(matches!(result, Err(GraphError::InvalidMakeBehavior(_))));
}

// ============================================================================
// Resume
// ============================================================================

#[rstest]
fn test_resume_from_drops_earlier_projects(reactor: Vec<Project>) {
    let request = request().with_resume_from(":web");
    let graph = build(reactor, &request).unwrap();
    assert_eq!(names(&graph), vec!["web", "app", "cli", "tools"]);
}

#[rstest]
fn test_resume_with_upstream_restores_dependencies(reactor: Vec<Project>) {
    let request = request()
        .with_activation(ProjectActivation::parse([":app"]))
        .with_make_behavior("upstream")
        .with_resume_from(":web");
    let graph = build(reactor, &request).unwrap();
    assert_eq!(names(&graph), vec!["api", "core", "web", "app"]);
}

#[rstest]
fn test_resume_target_missing_lists_available_projects(reactor: Vec<Project>) {
    let request = request()
        .with_activation(ProjectActivation::parse([":api", ":core"]))
        .with_resume_from(":tools");
    let err = build(reactor, &request).unwrap_err();

    assert_eq!(
        err,
        GraphError::ResumeTargetNotFound {
            selector: ":tools".to_string(),
            available: "org.test:api, org.test:core".to_string(),
        }
    );
    assert!(err.to_string().contains("org.test:api, org.test:core"));
}

// ============================================================================
// Exclusion
// ============================================================================

#[rstest]
fn test_excluded_project_removed(reactor: Vec<Project>) {
    let request = request().with_activation(ProjectActivation::parse(["!:cli", "-tools"]));
    let graph = build(reactor, &request).unwrap();
    assert_eq!(names(&graph), vec!["api", "core", "web", "app"]);
}

#[rstest]
fn test_exclusion_keeps_chain_through_removed_project(reactor: Vec<Project>) {
    let request = request().with_activation(ProjectActivation::parse(["!:core"]));
    let graph = build(reactor, &request).unwrap();

    let upstream: Vec<String> = graph
        .upstream_projects(&id("web"), false)
        .unwrap()
        .iter()
        .map(|p| p.id.artifact_id.clone())
        .collect();
    assert_eq!(upstream, vec!["api"]);
}

#[rstest]
fn test_excluding_everything_fails(reactor: Vec<Project>) {
    let activation = ProjectActivation::new()
        .with(ProjectSelector::include(":web"))
        .with(ProjectSelector::exclude(":web"));
    let request = request().with_activation(activation);

    assert_eq!(
        build(reactor, &request).unwrap_err(),
        GraphError::EmptyReactor {
            excluded: vec![":web".to_string()]
        }
    );
}

#[rstest]
fn test_unmatched_exclusion_fails_unless_optional(reactor: Vec<Project>) {
    let strict = request().with_activation(ProjectActivation::parse(["!:ghost"]));
    assert!(matches!(
        build(reactor.clone(), &strict),
        Err(GraphError::SelectorNotFound { .. })
    ));

    let lenient = request().with_activation(ProjectActivation::parse(["!?:ghost"]));
    assert_eq!(build(reactor, &lenient).unwrap().all_projects().len(), 6);
}

// ============================================================================
// Session reuse and collection
// ============================================================================

#[rstest]
fn test_previous_selection_reused(reactor: Vec<Project>) {
    let request = request().with_selected(vec![id("core"), id("api")]);
    let graph = build(reactor, &request).unwrap();
    assert_eq!(names(&graph), vec!["api", "core"]);
}

#[rstest]
fn test_cycle_reported_from_pipeline() {
    let projects = vec![project("a", &["b"]), project("b", &["a"])];
    let result = build(projects, &request());
    assert!(matches!(result, Err(GraphError::CycleDetected { .. })));
}

struct ProblematicCollector(Vec<Project>);

impl ProjectCollector for ProblematicCollector {
    fn collect(&self, _request: &ReactorRequest) -> Result<ProjectCollection, GraphError> {
        let mut collection = ProjectCollection::new(self.0.clone());
        collection
            .problems
            .push(ModelProblem::new("org.test:web", "deprecated element").at("line 12"));
        Ok(collection)
    }
}

#[rstest]
fn test_model_problems_do_not_stop_build(reactor: Vec<Project>) {
    let graph = GraphBuilder::new()
        .build(&request(), &ProblematicCollector(reactor))
        .unwrap();
    assert_eq!(graph.sorted_projects().len(), 6);
}

#[test]
fn test_empty_collection_is_a_building_error() {
    let result = GraphBuilder::new().build(&request(), &StaticProjectCollector::new(Vec::new()));
    assert!(matches!(result, Err(GraphError::ProjectBuilding { .. })));
}

#[rstest]
fn test_graph_shares_project_instances(reactor: Vec<Project>) {
    let graph = build(reactor, &request()).unwrap();
    let first = graph.sorted_projects();
    let second = graph.all_projects();
    let core_a = first.iter().find(|p| p.id == id("core")).unwrap();
    let core_b = second.iter().find(|p| p.id == id("core")).unwrap();
    assert!(Arc::ptr_eq(core_a, core_b));
}
