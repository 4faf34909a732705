//! Read-only projection of a project graph onto a whitelisted subset
use crate::error::{GraphError, GraphResult};
use crate::graph::{Direction, ProjectDependencyGraph};
use crate::project::{Project, ProjectId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

type QueryKey = (ProjectId, bool, Direction);

/// Filtered view over a base graph
///
/// Non-transitive queries reconstruct reachability through filtered-out
/// projects: an excluded direct neighbor is replaced by its own filtered
/// neighbors. Query results are memoized; the base graph and whitelist are
/// fixed for the lifetime of the view.
pub struct FilteredProjectGraph {
    base: Arc<dyn ProjectDependencyGraph>,
    whitelist: HashSet<ProjectId>,
    sorted: Vec<Arc<Project>>,
    /// Position of each whitelisted project within `sorted`
    rank: HashMap<ProjectId, usize>,
    cache: RwLock<HashMap<QueryKey, Vec<Arc<Project>>>>,
}

impl FilteredProjectGraph {
    /// Create a view restricted to the given projects
    pub fn new<'a, I>(base: Arc<dyn ProjectDependencyGraph>, whitelist: I) -> Self
    where
        I: IntoIterator<Item = &'a ProjectId>,
    {
        let whitelist: HashSet<ProjectId> = whitelist.into_iter().cloned().collect();
        let sorted: Vec<Arc<Project>> = base
            .sorted_projects()
            .into_iter()
            .filter(|p| whitelist.contains(&p.id))
            .collect();
        let rank = sorted
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();

        Self {
            base,
            whitelist,
            sorted,
            rank,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Check whether a project is part of the view
    pub fn is_active(&self, id: &ProjectId) -> bool {
        self.whitelist.contains(id)
    }

    fn query(
        &self,
        id: &ProjectId,
        transitive: bool,
        direction: Direction,
    ) -> GraphResult<Vec<Arc<Project>>> {
        let key = (id.clone(), transitive, direction);
        if let Some(hit) = self
            .cache
            .read()
            .map_err(|_| GraphError::Poisoned)?
            .get(&key)
        {
            return Ok(hit.clone());
        }

        let result = if transitive {
            self.base_neighbors(id, true, direction)?
                .into_iter()
                .filter(|p| self.whitelist.contains(&p.id))
                .collect()
        } else {
            let mut found = HashMap::new();
            let mut visited = HashSet::new();
            self.collect_through_excluded(id, direction, &mut visited, &mut found)?;
            let mut found: Vec<Arc<Project>> = found.into_values().collect();
            found.sort_by_key(|p| self.rank.get(&p.id).copied().unwrap_or(usize::MAX));
            found
        };

        self.cache
            .write()
            .map_err(|_| GraphError::Poisoned)?
            .insert(key, result.clone());
        Ok(result)
    }

    fn base_neighbors(
        &self,
        id: &ProjectId,
        transitive: bool,
        direction: Direction,
    ) -> GraphResult<Vec<Arc<Project>>> {
        match direction {
            Direction::Upstream => self.base.upstream_projects(id, transitive),
            Direction::Downstream => self.base.downstream_projects(id, transitive),
        }
    }

    fn collect_through_excluded(
        &self,
        id: &ProjectId,
        direction: Direction,
        visited: &mut HashSet<ProjectId>,
        found: &mut HashMap<ProjectId, Arc<Project>>,
    ) -> GraphResult<()> {
        for neighbor in self.base_neighbors(id, false, direction)? {
            if self.whitelist.contains(&neighbor.id) {
                found.insert(neighbor.id.clone(), neighbor);
            } else if visited.insert(neighbor.id.clone()) {
                self.collect_through_excluded(&neighbor.id, direction, visited, found)?;
            }
        }
        Ok(())
    }
}

impl ProjectDependencyGraph for FilteredProjectGraph {
    fn all_projects(&self) -> Vec<Arc<Project>> {
        self.base.all_projects()
    }

    fn sorted_projects(&self) -> Vec<Arc<Project>> {
        self.sorted.clone()
    }

    fn upstream_projects(
        &self,
        project: &ProjectId,
        transitive: bool,
    ) -> GraphResult<Vec<Arc<Project>>> {
        self.query(project, transitive, Direction::Upstream)
    }

    fn downstream_projects(
        &self,
        project: &ProjectId,
        transitive: bool,
    ) -> GraphResult<Vec<Arc<Project>>> {
        self.query(project, transitive, Direction::Downstream)
    }
}

impl std::fmt::Debug for FilteredProjectGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredProjectGraph")
            .field("active", &self.sorted.len())
            .field("total", &self.base.all_projects().len())
            .finish()
    }
}
