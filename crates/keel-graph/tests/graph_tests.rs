//! Project graph, filtered view and concurrent release tests

use keel_graph::{
    ConcurrencyDependencyGraph, FilteredProjectGraph, GraphError, Project, ProjectDependencyGraph,
    ProjectGraph, ProjectId, ProjectRef, ScheduledUnit,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

fn id(artifact: &str) -> ProjectId {
    ProjectId::new("org.test", artifact, "1.0")
}

fn project(artifact: &str, deps: &[&str]) -> Project {
    Project::new(id(artifact), format!("/reactor/{artifact}"))
        .with_dependencies(deps.iter().map(|d| ProjectRef::new("org.test", *d)).collect())
}

fn names(projects: &[Arc<Project>]) -> Vec<String> {
    projects.iter().map(|p| p.id.artifact_id.clone()).collect()
}

#[derive(Debug)]
struct Unit(ProjectId);

impl ScheduledUnit for Unit {
    fn project_id(&self) -> &ProjectId {
        &self.0
    }
}

fn unit_names(units: &[Arc<Unit>]) -> Vec<String> {
    units.iter().map(|u| u.0.artifact_id.clone()).collect()
}

/// A -> {B, C}, B -> Y, C -> {X, Z}
fn fan_out_graph() -> ProjectGraph {
    ProjectGraph::build(vec![
        project("A", &[]),
        project("B", &["A"]),
        project("C", &["A"]),
        project("X", &["C"]),
        project("Y", &["B"]),
        project("Z", &["C"]),
    ])
    .unwrap()
}

fn all_units(graph: &ProjectGraph) -> Vec<Unit> {
    graph
        .sorted_projects()
        .iter()
        .map(|p| Unit(p.id.clone()))
        .collect()
}

// ============================================================================
// Filtered view
// ============================================================================

#[test]
fn test_filtered_view_preserves_chain_through_excluded_project() {
    // A depends on B depends on C; B is filtered out
    let base = ProjectGraph::build(vec![
        project("A", &["B"]),
        project("B", &["C"]),
        project("C", &[]),
    ])
    .unwrap();
    let whitelist = vec![id("A"), id("C")];
    let view = FilteredProjectGraph::new(Arc::new(base), &whitelist);

    assert_eq!(names(&view.upstream_projects(&id("A"), false).unwrap()), vec!["C"]);
    assert_eq!(names(&view.downstream_projects(&id("C"), false).unwrap()), vec!["A"]);
    assert_eq!(names(&view.sorted_projects()), vec!["C", "A"]);
}

#[test]
fn test_filtered_view_shared_across_threads() {
    let base = Arc::new(fan_out_graph());
    let whitelist = vec![id("A"), id("X"), id("Y"), id("Z")];
    let view = Arc::new(FilteredProjectGraph::new(base, &whitelist));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let view = Arc::clone(&view);
            thread::spawn(move || names(&view.downstream_projects(&id("A"), false).unwrap()))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), vec!["X", "Y", "Z"]);
    }
}

// ============================================================================
// Concurrency release
// ============================================================================

#[test]
fn test_release_follows_build_order() {
    let graph = fan_out_graph();
    let concurrency = ConcurrencyDependencyGraph::new(&graph, all_units(&graph)).unwrap();

    assert_eq!(unit_names(&concurrency.root_schedulable_units()), vec!["A"]);
    assert_eq!(unit_names(&concurrency.mark_finished(&id("A")).unwrap()), vec!["B", "C"]);
    assert_eq!(unit_names(&concurrency.mark_finished(&id("B")).unwrap()), vec!["Y"]);
    assert_eq!(unit_names(&concurrency.mark_finished(&id("C")).unwrap()), vec!["X", "Z"]);
}

#[test]
fn test_finishing_order_does_not_change_released_set() {
    let graph = fan_out_graph();
    let concurrency = ConcurrencyDependencyGraph::new(&graph, all_units(&graph)).unwrap();

    concurrency.mark_finished(&id("A")).unwrap();
    assert_eq!(unit_names(&concurrency.mark_finished(&id("C")).unwrap()), vec!["X", "Z"]);
    assert_eq!(unit_names(&concurrency.mark_finished(&id("B")).unwrap()), vec!["Y"]);
}

#[test]
fn test_unit_outside_graph_rejected() {
    let graph = fan_out_graph();
    let result = ConcurrencyDependencyGraph::new(&graph, vec![Unit(id("missing"))]);
    assert!(matches!(result, Err(GraphError::UnknownProject { .. })));
}

#[test]
fn test_concurrent_completions_release_each_unit_once() {
    let mut projects = vec![project("root", &[])];
    let mids: Vec<String> = (0..16).map(|i| format!("mid{i}")).collect();
    for mid in &mids {
        projects.push(project(mid, &["root"]));
    }
    let mid_refs: Vec<&str> = mids.iter().map(String::as_str).collect();
    projects.push(project("sink", &mid_refs));

    let graph = ProjectGraph::build(projects).unwrap();
    let concurrency = Arc::new(ConcurrencyDependencyGraph::new(&graph, all_units(&graph)).unwrap());
    concurrency.mark_finished(&id("root")).unwrap();

    let released = Arc::new(Mutex::new(Vec::new()));
    let handles: Vec<_> = mids
        .iter()
        .map(|mid| {
            let concurrency = Arc::clone(&concurrency);
            let released = Arc::clone(&released);
            let mid = id(mid);
            thread::spawn(move || {
                let newly = concurrency.mark_finished(&mid).unwrap();
                released.lock().unwrap().extend(unit_names(&newly));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*released.lock().unwrap(), vec!["sink".to_string()]);
}

#[test]
fn test_every_unit_released_exactly_once() {
    let graph = fan_out_graph();
    let concurrency = ConcurrencyDependencyGraph::new(&graph, all_units(&graph)).unwrap();

    let mut seen = HashSet::new();
    let mut queue = concurrency.root_schedulable_units();
    while let Some(unit) = queue.pop() {
        assert!(seen.insert(unit.0.clone()), "released twice: {}", unit.0);
        queue.extend(concurrency.mark_finished(&unit.0).unwrap());
    }

    assert_eq!(seen.len(), concurrency.len());
    assert!(concurrency.unfinished_units().unwrap().is_empty());
}

// ============================================================================
// Acyclicity
// ============================================================================

/// Random DAG: each project may depend only on projects declared before it,
/// declared in shuffled order
fn dag_strategy() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (2usize..12).prop_flat_map(|n| {
        let deps = (0..n)
            .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i))
            .collect::<Vec<_>>();
        let order = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        (deps, order)
    })
}

proptest! {
    #[test]
    fn prop_sorted_projects_respect_every_edge((deps, order) in dag_strategy()) {
        let projects: Vec<Project> = order
            .iter()
            .map(|&i| {
                let refs: Vec<String> = deps[i].iter().map(|d| format!("p{d}")).collect();
                let refs: Vec<&str> = refs.iter().map(String::as_str).collect();
                project(&format!("p{i}"), &refs)
            })
            .collect();

        let graph = ProjectGraph::build(projects).unwrap();
        let sorted = names(&graph.sorted_projects());
        prop_assert_eq!(sorted.len(), deps.len());

        let position = |name: &str| sorted.iter().position(|s| s == name).unwrap();
        for (i, edges) in deps.iter().enumerate() {
            for d in edges {
                let (upstream, downstream) = (position(&format!("p{d}")), position(&format!("p{i}")));
                prop_assert!(upstream < downstream, "p{} must precede p{}", d, i);
            }
        }
    }

    #[test]
    fn prop_back_edge_is_detected((deps, _order) in dag_strategy()) {
        let n = deps.len();
        // p0 depends on the last project which transitively may not reach p0;
        // add a direct edge back to guarantee a cycle
        let mut projects: Vec<Project> = (0..n)
            .map(|i| {
                let refs: Vec<String> = deps[i].iter().map(|d| format!("p{d}")).collect();
                let refs: Vec<&str> = refs.iter().map(String::as_str).collect();
                project(&format!("p{i}"), &refs)
            })
            .collect();
        let last = format!("p{}", n - 1);
        projects[0] = project("p0", &[&last]);
        projects[n - 1].dependencies.push(ProjectRef::new("org.test", "p0"));

        let result = ProjectGraph::build(projects);
        let is_cycle = matches!(result, Err(GraphError::CycleDetected { .. }));
        prop_assert!(is_cycle);
    }
}
