//! In-memory plugin and binding registries, plus the standard packaging mappings
use crate::binding::MojoBinding;
use crate::descriptor::{MojoDescriptor, PluginDescriptor};
use crate::error::{PlanError, PlanResult, PluginLoadError};
use crate::lifecycle::LifecycleBindings;
use crate::source::{LifecycleBindingSource, PluginLoader, ReportBindingProvider};
use keel_graph::{Project, ProjectId};
use std::collections::HashMap;
use std::sync::Arc;

/// Group of the bundled plugins
pub const PLUGIN_GROUP: &str = "org.keel.plugins";

/// Version of the bundled plugins
pub const PLUGIN_VERSION: &str = "1.0";

fn standard(artifact: &str, goal: &str) -> MojoBinding {
    MojoBinding::new(PLUGIN_GROUP, artifact, goal).with_version(PLUGIN_VERSION)
}

fn bind(bindings: &mut LifecycleBindings, phase: &str, binding: MojoBinding) -> PlanResult<()> {
    bindings.add_binding(phase, binding)
}

/// Core bindings for the clean and site lifecycles
pub fn default_lifecycle_bindings() -> PlanResult<LifecycleBindings> {
    let mut bindings = LifecycleBindings::new();
    bind(&mut bindings, "clean", standard("keel-clean-plugin", "clean"))?;
    bind(&mut bindings, "site", standard("keel-site-plugin", "site"))?;
    bind(&mut bindings, "site-deploy", standard("keel-site-plugin", "deploy"))?;
    Ok(bindings)
}

/// Default lifecycle mapping of a packaging type, if the packaging is known
pub fn packaging_lifecycle_bindings(packaging: &str) -> PlanResult<Option<LifecycleBindings>> {
    let mut bindings = LifecycleBindings::new().with_packaging(packaging);
    match packaging {
        "jar" => {
            bind(&mut bindings, "process-resources", standard("keel-resources-plugin", "resources"))?;
            bind(&mut bindings, "compile", standard("keel-compiler-plugin", "compile"))?;
            bind(
                &mut bindings,
                "process-test-resources",
                standard("keel-resources-plugin", "test-resources"),
            )?;
            bind(&mut bindings, "test-compile", standard("keel-compiler-plugin", "test-compile"))?;
            bind(&mut bindings, "test", standard("keel-test-plugin", "test"))?;
            bind(&mut bindings, "package", standard("keel-jar-plugin", "jar"))?;
        }
        "pom" => {}
        _ => return Ok(None),
    }
    bind(&mut bindings, "install", standard("keel-install-plugin", "install"))?;
    bind(&mut bindings, "deploy", standard("keel-deploy-plugin", "deploy"))?;
    Ok(Some(bindings))
}

/// Descriptors of the bundled plugins
pub fn standard_plugins() -> Vec<PluginDescriptor> {
    let plugin = |artifact: &str, prefix: &str| {
        PluginDescriptor::new(PLUGIN_GROUP, artifact, PLUGIN_VERSION).with_goal_prefix(prefix)
    };
    vec![
        plugin("keel-clean-plugin", "clean").with_mojo(MojoDescriptor::new("clean")),
        plugin("keel-resources-plugin", "resources")
            .with_mojo(MojoDescriptor::new("resources"))
            .with_mojo(MojoDescriptor::new("test-resources")),
        plugin("keel-compiler-plugin", "compiler")
            .with_mojo(MojoDescriptor::new("compile"))
            .with_mojo(MojoDescriptor::new("test-compile")),
        plugin("keel-test-plugin", "test").with_mojo(MojoDescriptor::new("test")),
        plugin("keel-jar-plugin", "jar").with_mojo(MojoDescriptor::new("jar")),
        plugin("keel-install-plugin", "install").with_mojo(MojoDescriptor::new("install")),
        plugin("keel-deploy-plugin", "deploy").with_mojo(MojoDescriptor::new("deploy")),
        plugin("keel-site-plugin", "site")
            .with_mojo(MojoDescriptor::new("site").requiring_reports())
            .with_mojo(MojoDescriptor::new("deploy")),
    ]
}

/// Plugin loader over a fixed set of descriptors
#[derive(Debug, Clone, Default)]
pub struct StaticPluginLoader {
    plugins: HashMap<String, Arc<PluginDescriptor>>,
    failures: HashMap<String, String>,
}

impl StaticPluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader knowing the bundled plugins
    pub fn standard() -> Self {
        standard_plugins()
            .into_iter()
            .fold(Self::new(), |loader, plugin| loader.with_plugin(plugin))
    }

    pub fn with_plugin(mut self, plugin: PluginDescriptor) -> Self {
        let key = format!("{}:{}", plugin.group_id, plugin.artifact_id);
        self.plugins.insert(key, Arc::new(plugin));
        self
    }

    /// Make loading `group:artifact` fail with the given reason
    pub fn with_failure(mut self, plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.insert(plugin.into(), reason.into());
        self
    }
}

impl PluginLoader for StaticPluginLoader {
    fn load_plugin(
        &self,
        binding: &MojoBinding,
        _project: &Project,
    ) -> Result<Arc<PluginDescriptor>, PluginLoadError> {
        let key = format!("{}:{}", binding.group_id, binding.artifact_id);
        if let Some(reason) = self.failures.get(&key) {
            return Err(PluginLoadError::new(binding.plugin_key(), reason.clone()));
        }
        self.plugins
            .get(&key)
            .cloned()
            .ok_or_else(|| PluginLoadError::new(binding.plugin_key(), "plugin not found"))
    }

    fn plugin_for_prefix(
        &self,
        prefix: &str,
        _project: &Project,
    ) -> Result<Arc<PluginDescriptor>, PluginLoadError> {
        let mut matches: Vec<_> = self
            .plugins
            .values()
            .filter(|p| p.goal_prefix.as_deref() == Some(prefix))
            .collect();
        matches.sort_by_key(|p| p.id());
        matches
            .first()
            .map(|p| Arc::clone(p))
            .ok_or_else(|| PluginLoadError::new(prefix, "no plugin found for prefix"))
    }
}

/// Binding source over fixed per-packaging and per-project tables
#[derive(Debug, Clone)]
pub struct StaticBindingSource {
    defaults: LifecycleBindings,
    packaging: HashMap<String, LifecycleBindings>,
    projects: HashMap<ProjectId, LifecycleBindings>,
    reports: HashMap<ProjectId, Vec<MojoBinding>>,
    overlays: HashMap<(String, String), LifecycleBindings>,
}

impl StaticBindingSource {
    /// Empty source: every lifecycle is unbound
    pub fn new() -> Self {
        Self {
            defaults: LifecycleBindings::new(),
            packaging: HashMap::new(),
            projects: HashMap::new(),
            reports: HashMap::new(),
            overlays: HashMap::new(),
        }
    }

    /// Source with the core defaults and the `jar` and `pom` packaging mappings
    pub fn standard() -> PlanResult<Self> {
        let mut source = Self::new().with_defaults(default_lifecycle_bindings()?);
        for packaging in ["jar", "pom"] {
            if let Some(bindings) = packaging_lifecycle_bindings(packaging)? {
                source = source.with_packaging(packaging, bindings);
            }
        }
        Ok(source)
    }

    pub fn with_defaults(mut self, defaults: LifecycleBindings) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_packaging(mut self, packaging: impl Into<String>, bindings: LifecycleBindings) -> Self {
        self.packaging.insert(packaging.into(), bindings);
        self
    }

    pub fn with_project(mut self, project: ProjectId, bindings: LifecycleBindings) -> Self {
        self.projects.insert(project, bindings);
        self
    }

    pub fn with_reports(mut self, project: ProjectId, reports: Vec<MojoBinding>) -> Self {
        self.reports.insert(project, reports);
        self
    }

    /// Register the overlay `lifecycle` of the plugin `group:artifact`
    pub fn with_overlay(
        mut self,
        plugin: impl Into<String>,
        lifecycle: impl Into<String>,
        bindings: LifecycleBindings,
    ) -> Self {
        self.overlays.insert((plugin.into(), lifecycle.into()), bindings);
        self
    }
}

impl Default for StaticBindingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleBindingSource for StaticBindingSource {
    fn default_bindings(&self, _project: &Project) -> PlanResult<LifecycleBindings> {
        Ok(self.defaults.clone())
    }

    fn packaging_bindings(&self, project: &Project) -> PlanResult<LifecycleBindings> {
        self.packaging
            .get(&project.packaging)
            .cloned()
            .ok_or_else(|| PlanError::Bindings {
                project: project.id.to_string(),
                reason: format!("no lifecycle mapping for packaging '{}'", project.packaging),
            })
    }

    fn project_bindings(&self, project: &Project) -> PlanResult<LifecycleBindings> {
        Ok(self.projects.get(&project.id).cloned().unwrap_or_default())
    }

    fn lifecycle_overlay(
        &self,
        plugin: &PluginDescriptor,
        lifecycle: &str,
        _project: &Project,
    ) -> Result<LifecycleBindings, PluginLoadError> {
        let key = (
            format!("{}:{}", plugin.group_id, plugin.artifact_id),
            lifecycle.to_string(),
        );
        self.overlays
            .get(&key)
            .cloned()
            .ok_or_else(|| PluginLoadError::new(plugin.id(), format!("lifecycle '{lifecycle}' not declared")))
    }
}

impl ReportBindingProvider for StaticBindingSource {
    fn report_bindings(&self, project: &Project) -> PlanResult<Vec<MojoBinding>> {
        Ok(self.reports.get(&project.id).cloned().unwrap_or_default())
    }
}
