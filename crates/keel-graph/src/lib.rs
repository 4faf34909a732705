//! Keel project graph
//!
//! Provides the reactor-level graph machinery:
//! - Project model and dependency graph with deterministic build order
//! - Filtered reactor views that preserve reachability through excluded projects
//! - Concurrent release tracking for multi-threaded builds
//! - Project selection, resume and exclusion handling

pub mod builder;
pub mod collect;
pub mod concurrency;
pub mod error;
pub mod filtered;
pub mod graph;
pub mod project;
pub mod selector;

// Re-export main types
pub use builder::{GraphBuilder, MakeBehavior, ReactorGraph, ReactorRequest};
pub use collect::{ModelProblem, ProjectCollection, ProjectCollector, StaticProjectCollector};
pub use concurrency::{ConcurrencyDependencyGraph, ScheduledUnit, UnitState};
pub use error::{GraphError, GraphResult};
pub use filtered::FilteredProjectGraph;
pub use graph::{Direction, ProjectDependencyGraph, ProjectGraph};
pub use project::{PluginRef, Project, ProjectId, ProjectRef};
pub use selector::{ProjectActivation, ProjectSelector, SelectorKind};
