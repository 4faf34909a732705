//! Dependency-aware release of scheduled units for concurrent builds
use crate::error::{GraphError, GraphResult};
use crate::graph::ProjectDependencyGraph;
use crate::project::ProjectId;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A unit of work bound to one project
pub trait ScheduledUnit: Send + Sync {
    fn project_id(&self) -> &ProjectId;
}

/// Lifecycle of a unit inside the concurrency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Waiting on unfinished upstream units
    Pending,
    /// Released to the scheduler
    Schedulable,
    /// Completed; downstream units were notified
    Finished,
}

#[derive(Debug)]
struct ReleaseState {
    /// Unfinished upstream units per unit
    blocking: Vec<usize>,
    states: Vec<UnitState>,
}

/// Tracks which scheduled units may run next
///
/// Only units in the active set count as blockers. The release order after
/// each completion follows the build order of the underlying graph.
#[derive(Debug)]
pub struct ConcurrencyDependencyGraph<U> {
    /// Units in build order
    units: Vec<Arc<U>>,
    index: HashMap<ProjectId, usize>,
    downstream: Vec<Vec<usize>>,
    roots: Vec<usize>,
    state: Mutex<ReleaseState>,
}

impl<U: ScheduledUnit> ConcurrencyDependencyGraph<U> {
    /// Pair a graph with the units scheduled for this build
    pub fn new(graph: &dyn ProjectDependencyGraph, units: Vec<U>) -> GraphResult<Self> {
        let known: HashSet<ProjectId> = graph.all_projects().iter().map(|p| p.id.clone()).collect();
        let order: HashMap<ProjectId, usize> = graph
            .sorted_projects()
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();

        let mut units: Vec<Arc<U>> = units.into_iter().map(Arc::new).collect();
        for unit in &units {
            if !known.contains(unit.project_id()) {
                return Err(GraphError::unknown(unit.project_id()));
            }
        }
        units.sort_by_key(|u| {
            order
                .get(u.project_id())
                .copied()
                .unwrap_or(usize::MAX)
        });

        let mut index = HashMap::with_capacity(units.len());
        for (i, unit) in units.iter().enumerate() {
            if index.insert(unit.project_id().clone(), i).is_some() {
                return Err(GraphError::DuplicateProject {
                    project: unit.project_id().to_string(),
                });
            }
        }

        let mut upstream = Vec::with_capacity(units.len());
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); units.len()];
        for (i, unit) in units.iter().enumerate() {
            let mut active = BTreeSet::new();
            let mut visited = HashSet::new();
            active_upstream(graph, unit.project_id(), &index, &mut visited, &mut active)?;
            for &up in &active {
                downstream[up].push(i);
            }
            upstream.push(active.into_iter().collect::<Vec<_>>());
        }

        let blocking: Vec<usize> = upstream.iter().map(Vec::len).collect();
        let roots: Vec<usize> = (0..units.len()).filter(|&i| blocking[i] == 0).collect();
        let mut states = vec![UnitState::Pending; units.len()];
        for &root in &roots {
            states[root] = UnitState::Schedulable;
        }

        Ok(Self {
            units,
            index,
            downstream,
            roots,
            state: Mutex::new(ReleaseState { blocking, states }),
        })
    }

    /// Units with no unfinished upstream units at the start of the build
    pub fn root_schedulable_units(&self) -> Vec<Arc<U>> {
        self.roots.iter().map(|&i| self.units[i].clone()).collect()
    }

    /// Mark a unit finished and return the units it released
    ///
    /// A unit may be finished while still pending (a skipped project); it
    /// then releases its dependents without ever being scheduled itself.
    pub fn mark_finished(&self, project: &ProjectId) -> GraphResult<Vec<Arc<U>>> {
        let i = self.index_of(project)?;
        let mut state = self.state.lock().map_err(|_| GraphError::Poisoned)?;

        if state.states[i] == UnitState::Finished {
            return Err(GraphError::AlreadyFinished {
                project: project.to_string(),
            });
        }
        state.states[i] = UnitState::Finished;

        let mut released = Vec::new();
        for &down in &self.downstream[i] {
            state.blocking[down] -= 1;
            if state.blocking[down] == 0 && state.states[down] == UnitState::Pending {
                state.states[down] = UnitState::Schedulable;
                released.push(self.units[down].clone());
            }
        }

        debug!(
            project = %project,
            released = released.len(),
            "unit finished"
        );
        Ok(released)
    }

    /// Current state of a unit
    pub fn state(&self, project: &ProjectId) -> GraphResult<UnitState> {
        let i = self.index_of(project)?;
        let state = self.state.lock().map_err(|_| GraphError::Poisoned)?;
        Ok(state.states[i])
    }

    /// Units not yet finished, in build order
    pub fn unfinished_units(&self) -> GraphResult<Vec<Arc<U>>> {
        let state = self.state.lock().map_err(|_| GraphError::Poisoned)?;
        Ok(state
            .states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s != UnitState::Finished)
            .map(|(i, _)| self.units[i].clone())
            .collect())
    }

    /// All units in build order
    pub fn units(&self) -> &[Arc<U>] {
        &self.units
    }

    /// Number of scheduled units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn index_of(&self, project: &ProjectId) -> GraphResult<usize> {
        self.index
            .get(project)
            .copied()
            .ok_or_else(|| GraphError::NotScheduled {
                project: project.to_string(),
            })
    }
}

/// Direct upstream units within the active set, looking through projects
/// that are in the graph but not scheduled
fn active_upstream(
    graph: &dyn ProjectDependencyGraph,
    project: &ProjectId,
    index: &HashMap<ProjectId, usize>,
    visited: &mut HashSet<ProjectId>,
    active: &mut BTreeSet<usize>,
) -> GraphResult<()> {
    for up in graph.upstream_projects(project, false)? {
        if let Some(&i) = index.get(&up.id) {
            active.insert(i);
        } else if visited.insert(up.id.clone()) {
            active_upstream(graph, &up.id, index, visited, active)?;
        }
    }
    Ok(())
}
