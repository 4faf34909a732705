//! Build units participating in a reactor build
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stable identity of a project: group, artifact and version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl ProjectId {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }

    /// `group:artifact`, the key used when matching references and selectors
    pub fn versionless_key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// Reference from one project to another (dependency, parent, plugin)
///
/// The version is optional: an unversioned reference binds to every reactor
/// project sharing the group and artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectRef {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
}

impl ProjectRef {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn versionless_key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

impl From<&ProjectId> for ProjectRef {
    fn from(id: &ProjectId) -> Self {
        ProjectRef::new(&id.group_id, &id.artifact_id).with_version(&id.version)
    }
}

/// A build plugin declared by a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRef {
    pub plugin: ProjectRef,
    /// Whether the plugin is loaded as a build extension
    pub extensions: bool,
    /// Dependencies declared on the plugin itself
    pub dependencies: Vec<ProjectRef>,
}

impl PluginRef {
    pub fn new(plugin: ProjectRef) -> Self {
        Self {
            plugin,
            extensions: false,
            dependencies: Vec::new(),
        }
    }

    pub fn as_extension(mut self) -> Self {
        self.extensions = true;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<ProjectRef>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// One buildable unit of the reactor
///
/// Immutable for the duration of a build invocation; graphs share projects
/// through `Arc<Project>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// Display name, defaults to the artifact id
    pub name: String,
    pub packaging: String,
    /// Descriptor file of the project
    pub file: Option<PathBuf>,
    /// Base directory of the project
    pub basedir: PathBuf,
    pub parent: Option<ProjectRef>,
    pub dependencies: Vec<ProjectRef>,
    pub build_plugins: Vec<PluginRef>,
    /// Whether this project is the one the build was started from
    pub execution_root: bool,
}

impl Project {
    /// Create a new project with jar packaging and no edges
    pub fn new(id: ProjectId, basedir: impl Into<PathBuf>) -> Self {
        Self {
            name: id.artifact_id.clone(),
            id,
            packaging: "jar".to_string(),
            file: None,
            basedir: basedir.into(),
            parent: None,
            dependencies: Vec::new(),
            build_plugins: Vec::new(),
            execution_root: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_packaging(mut self, packaging: impl Into<String>) -> Self {
        self.packaging = packaging.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_parent(mut self, parent: ProjectRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<ProjectRef>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_build_plugins(mut self, plugins: Vec<PluginRef>) -> Self {
        self.build_plugins = plugins;
        self
    }

    pub fn as_execution_root(mut self) -> Self {
        self.execution_root = true;
        self
    }

    pub fn group_id(&self) -> &str {
        &self.id.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.id.artifact_id
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
