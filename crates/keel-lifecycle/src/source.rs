//! Collaborators the planner consults for bindings and plugin metadata
use crate::binding::MojoBinding;
use crate::descriptor::PluginDescriptor;
use crate::error::{PlanResult, PluginLoadError};
use crate::lifecycle::LifecycleBindings;
use keel_graph::Project;
use std::sync::Arc;

/// Resolves plugin metadata for a binding
pub trait PluginLoader: Send + Sync {
    fn load_plugin(
        &self,
        binding: &MojoBinding,
        project: &Project,
    ) -> Result<Arc<PluginDescriptor>, PluginLoadError>;

    /// Resolve the plugin behind a `prefix:goal` task
    fn plugin_for_prefix(
        &self,
        prefix: &str,
        project: &Project,
    ) -> Result<Arc<PluginDescriptor>, PluginLoadError>;
}

/// Supplies the three binding layers merged into a project's plan
pub trait LifecycleBindingSource: Send + Sync {
    /// Core bindings, used for lifecycles the packaging leaves empty
    fn default_bindings(&self, project: &Project) -> PlanResult<LifecycleBindings>;

    fn packaging_bindings(&self, project: &Project) -> PlanResult<LifecycleBindings>;

    /// Bindings declared in the project descriptor
    fn project_bindings(&self, project: &Project) -> PlanResult<LifecycleBindings>;

    /// Lifecycle overlay a plugin ships for forked phases
    fn lifecycle_overlay(
        &self,
        plugin: &PluginDescriptor,
        lifecycle: &str,
        project: &Project,
    ) -> Result<LifecycleBindings, PluginLoadError>;
}

/// Supplies the bindings that produce a project's configured reports
pub trait ReportBindingProvider: Send + Sync {
    fn report_bindings(&self, project: &Project) -> PlanResult<Vec<MojoBinding>>;
}
