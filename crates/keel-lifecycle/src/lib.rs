//! Keel lifecycle planning
//!
//! Turns a project's requested tasks into an ordered execution plan:
//! - Standard clean, default and site lifecycles
//! - Layered binding merge with configuration deep-merge
//! - Forked executions, report injection and late-bound plugins

pub mod binding;
pub mod descriptor;
pub mod error;
pub mod lifecycle;
pub mod plan;
pub mod planner;
pub mod registry;
pub mod source;

// Re-export main types
pub use binding::{merge_configuration, BindingKey, BindingOrigin, MojoBinding, DEFAULT_EXECUTION_ID};
pub use descriptor::{MojoDescriptor, PluginDescriptor};
pub use error::{PlanError, PlanResult, PluginLoadError};
pub use lifecycle::{
    is_valid_phase, merge_bindings, valid_phase_names, LifecycleBinding, LifecycleBindings,
    LifecycleKind, MergePolicy, Phase,
};
pub use plan::{BuildPlan, ExecutionStack, Fork, PlanStep};
pub use planner::BuildPlanner;
pub use registry::{StaticBindingSource, StaticPluginLoader};
pub use source::{LifecycleBindingSource, PluginLoader, ReportBindingProvider};
