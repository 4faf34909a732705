//! Shared failure state of a running reactor build
use crate::error::{BuildError, BuildResult};
use keel_config::FailMode;
use keel_graph::{ProjectDependencyGraph, ProjectId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Decides which projects still run after failures
///
/// - fail-fast: the first failure halts the build; everything not yet
///   started is skipped
/// - fail-at-end: the failed project's downstream projects are blacklisted
/// - fail-never: nothing is skipped
#[derive(Debug)]
pub struct ReactorBuildStatus {
    fail_mode: FailMode,
    halted: AtomicBool,
    blacklist: Mutex<HashSet<ProjectId>>,
}

impl ReactorBuildStatus {
    pub fn new(fail_mode: FailMode) -> Self {
        Self {
            fail_mode,
            halted: AtomicBool::new(false),
            blacklist: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_mode(&self) -> FailMode {
        self.fail_mode
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    /// Whether the project must be skipped instead of built
    pub fn should_skip(&self, project: &ProjectId) -> BuildResult<bool> {
        if self.is_halted() {
            return Ok(true);
        }
        let blacklist = self.blacklist.lock().map_err(|_| BuildError::Poisoned)?;
        Ok(blacklist.contains(project))
    }

    /// Apply the fail mode to a failed project
    pub fn record_failure(
        &self,
        project: &ProjectId,
        graph: &dyn ProjectDependencyGraph,
    ) -> BuildResult<()> {
        match self.fail_mode {
            FailMode::FailFast => {
                debug!(project = %project, "halting build after failure");
                self.halt();
            }
            FailMode::FailAtEnd => {
                let downstream = graph.downstream_projects(project, true)?;
                let mut blacklist = self.blacklist.lock().map_err(|_| BuildError::Poisoned)?;
                blacklist.insert(project.clone());
                for dependent in downstream {
                    debug!(project = %dependent.id, failed = %project, "blacklisting dependent");
                    blacklist.insert(dependent.id.clone());
                }
            }
            FailMode::FailNever => {}
        }
        Ok(())
    }
}
