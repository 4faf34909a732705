//! Project dependency graph with a deterministic topological order
use crate::error::{GraphError, GraphResult};
use crate::project::{Project, ProjectId, ProjectRef};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Read-only queries shared by the full graph and its filtered views
///
/// Every list returned is in build order.
pub trait ProjectDependencyGraph: Send + Sync {
    /// All projects known to the graph, including filtered-out ones
    fn all_projects(&self) -> Vec<Arc<Project>>;

    /// Active projects in build order
    fn sorted_projects(&self) -> Vec<Arc<Project>>;

    /// Projects the given project depends on
    fn upstream_projects(
        &self,
        project: &ProjectId,
        transitive: bool,
    ) -> GraphResult<Vec<Arc<Project>>>;

    /// Projects depending on the given project
    fn downstream_projects(
        &self,
        project: &ProjectId,
        transitive: bool,
    ) -> GraphResult<Vec<Arc<Project>>>;
}

/// Direction of an edge walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Upstream,
    Downstream,
}

/// Acyclic dependency graph over a fixed set of projects
///
/// Built once; the sort order is computed at construction and never
/// updated incrementally.
#[derive(Debug)]
pub struct ProjectGraph {
    /// Projects in declaration order
    projects: Vec<Arc<Project>>,
    index: HashMap<ProjectId, usize>,
    /// Direct dependencies, ordered by rank
    upstream: Vec<Vec<usize>>,
    /// Direct dependents, ordered by rank
    downstream: Vec<Vec<usize>>,
    /// Declaration indices in build order
    order: Vec<usize>,
    /// Position of each declaration index within `order`
    rank: Vec<usize>,
}

impl ProjectGraph {
    /// Build the graph from the edges declared on each project
    ///
    /// Parent and dependency edges are mandatory: a cycle among them fails
    /// the build. Plugin and extension edges are dropped when they would
    /// close a cycle.
    pub fn build(projects: Vec<Project>) -> GraphResult<Self> {
        let projects: Vec<Arc<Project>> = projects.into_iter().map(Arc::new).collect();

        let mut index = HashMap::with_capacity(projects.len());
        for (i, project) in projects.iter().enumerate() {
            if index.insert(project.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateProject {
                    project: project.id.to_string(),
                });
            }
        }

        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, project) in projects.iter().enumerate() {
            by_key
                .entry(project.id.versionless_key())
                .or_default()
                .push(i);
        }

        let resolve = |reference: &ProjectRef, from: usize| -> Vec<usize> {
            let Some(candidates) = by_key.get(&reference.versionless_key()) else {
                return Vec::new();
            };
            let exact = reference.version.as_ref().and_then(|version| {
                candidates
                    .iter()
                    .copied()
                    .find(|&c| &projects[c].id.version == version)
            });
            let matched = match exact {
                Some(c) => vec![c],
                None => candidates.clone(),
            };
            matched.into_iter().filter(|&c| c != from).collect()
        };

        let mut upstream: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); projects.len()];

        for (i, project) in projects.iter().enumerate() {
            if let Some(parent) = &project.parent {
                upstream[i].extend(resolve(parent, i));
            }
            for dependency in &project.dependencies {
                upstream[i].extend(resolve(dependency, i));
            }
        }

        if let Some(cycle) = find_cycle(&upstream) {
            return Err(GraphError::cycle(
                cycle.into_iter().map(|i| projects[i].id.to_string()),
            ));
        }

        for (i, project) in projects.iter().enumerate() {
            for plugin in &project.build_plugins {
                let targets = std::iter::once(&plugin.plugin).chain(plugin.dependencies.iter());
                for reference in targets {
                    for target in resolve(reference, i) {
                        if upstream[i].contains(&target) {
                            continue;
                        }
                        if reaches(&upstream, target, i) {
                            debug!(
                                project = %project.id,
                                plugin = %reference.versionless_key(),
                                "skipping plugin edge that would introduce a cycle"
                            );
                            continue;
                        }
                        upstream[i].insert(target);
                    }
                }
            }
        }

        let order = stable_topological_order(&upstream);
        let mut rank = vec![0; projects.len()];
        for (position, &i) in order.iter().enumerate() {
            rank[i] = position;
        }

        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); projects.len()];
        for (i, deps) in upstream.iter().enumerate() {
            for &dep in deps {
                downstream[dep].push(i);
            }
        }
        for list in &mut downstream {
            list.sort_by_key(|&i| rank[i]);
        }
        let upstream = upstream
            .into_iter()
            .map(|deps| {
                let mut deps: Vec<usize> = deps.into_iter().collect();
                deps.sort_by_key(|&i| rank[i]);
                deps
            })
            .collect();

        Ok(Self {
            projects,
            index,
            upstream,
            downstream,
            order,
            rank,
        })
    }

    /// Get a project by id
    pub fn project(&self, id: &ProjectId) -> Option<&Arc<Project>> {
        self.index.get(id).map(|&i| &self.projects[i])
    }

    /// Check whether a project belongs to the graph
    pub fn contains(&self, id: &ProjectId) -> bool {
        self.index.contains_key(id)
    }

    /// Get project count
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    fn index_of(&self, id: &ProjectId) -> GraphResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::unknown(id))
    }

    fn neighbors(&self, i: usize, direction: Direction) -> &[usize] {
        match direction {
            Direction::Upstream => &self.upstream[i],
            Direction::Downstream => &self.downstream[i],
        }
    }

    fn walk(
        &self,
        id: &ProjectId,
        transitive: bool,
        direction: Direction,
    ) -> GraphResult<Vec<Arc<Project>>> {
        let start = self.index_of(id)?;

        let mut found: Vec<usize> = if transitive {
            let mut visited = HashSet::new();
            let mut stack: Vec<usize> = self.neighbors(start, direction).to_vec();
            while let Some(next) = stack.pop() {
                if !visited.insert(next) {
                    continue;
                }
                stack.extend(self.neighbors(next, direction).iter().copied());
            }
            visited.into_iter().collect()
        } else {
            self.neighbors(start, direction).to_vec()
        };

        found.sort_by_key(|&i| self.rank[i]);
        Ok(found.into_iter().map(|i| self.projects[i].clone()).collect())
    }
}

impl ProjectDependencyGraph for ProjectGraph {
    fn all_projects(&self) -> Vec<Arc<Project>> {
        self.projects.clone()
    }

    fn sorted_projects(&self) -> Vec<Arc<Project>> {
        self.order.iter().map(|&i| self.projects[i].clone()).collect()
    }

    fn upstream_projects(
        &self,
        project: &ProjectId,
        transitive: bool,
    ) -> GraphResult<Vec<Arc<Project>>> {
        self.walk(project, transitive, Direction::Upstream)
    }

    fn downstream_projects(
        &self,
        project: &ProjectId,
        transitive: bool,
    ) -> GraphResult<Vec<Arc<Project>>> {
        self.walk(project, transitive, Direction::Downstream)
    }
}

/// Kahn's algorithm, always releasing the lowest declaration index first
fn stable_topological_order(upstream: &[BTreeSet<usize>]) -> Vec<usize> {
    let mut in_degree: Vec<usize> = upstream.iter().map(BTreeSet::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); upstream.len()];
    for (i, deps) in upstream.iter().enumerate() {
        for &dep in deps {
            dependents[dep].push(i);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(upstream.len());
    while let Some(Reverse(next)) = ready.pop() {
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    order
}

/// Whether `to` is reachable from `from` along dependency edges
fn reaches(upstream: &[BTreeSet<usize>], from: usize, to: usize) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![from];
    while let Some(next) = stack.pop() {
        if next == to {
            return true;
        }
        if visited.insert(next) {
            stack.extend(upstream[next].iter().copied());
        }
    }
    false
}

/// Find a cycle in the graph, returned as a closed path `a, b, ..., a`
fn find_cycle(upstream: &[BTreeSet<usize>]) -> Option<Vec<usize>> {
    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();
    let mut path = Vec::new();

    for start in 0..upstream.len() {
        if let Some(cycle) = dfs_find_cycle(upstream, start, &mut visited, &mut on_stack, &mut path)
        {
            return Some(cycle);
        }
    }
    None
}

fn dfs_find_cycle(
    upstream: &[BTreeSet<usize>],
    node: usize,
    visited: &mut HashSet<usize>,
    on_stack: &mut HashSet<usize>,
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    if on_stack.contains(&node) {
        let start = path.iter().position(|&n| n == node).unwrap_or(0);
        let mut cycle = path[start..].to_vec();
        cycle.push(node);
        return Some(cycle);
    }

    if !visited.insert(node) {
        return None;
    }

    on_stack.insert(node);
    path.push(node);

    for &dep in &upstream[node] {
        if let Some(cycle) = dfs_find_cycle(upstream, dep, visited, on_stack, path) {
            return Some(cycle);
        }
    }

    on_stack.remove(&node);
    path.pop();
    None
}
