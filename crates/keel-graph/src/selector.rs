//! Project selectors used to pick, exclude or resume reactor projects
use crate::project::Project;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// How a selector participates in project activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Include,
    Exclude,
}

/// A single project selector
///
/// `[groupId]:artifactId` when the text contains a colon, otherwise a path
/// relative to the reactor base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSelector {
    pub selector: String,
    pub kind: SelectorKind,
    /// An optional selector that matches nothing is only logged
    pub optional: bool,
}

impl ProjectSelector {
    pub fn include(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            kind: SelectorKind::Include,
            optional: false,
        }
    }

    pub fn exclude(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            kind: SelectorKind::Exclude,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Parse `[!|-][?]selector`
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (kind, rest) = match raw.strip_prefix(['!', '-']) {
            Some(rest) => (SelectorKind::Exclude, rest),
            None => (SelectorKind::Include, raw),
        };
        let (optional, selector) = match rest.strip_prefix('?') {
            Some(selector) => (true, selector),
            None => (false, rest),
        };
        Self {
            selector: selector.to_string(),
            kind,
            optional,
        }
    }

    /// Check whether the selector designates the given project
    pub fn matches(&self, project: &Project, base_directory: Option<&Path>) -> bool {
        matches_project(&self.selector, project, base_directory)
    }
}

impl fmt::Display for ProjectSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == SelectorKind::Exclude {
            write!(f, "!")?;
        }
        if self.optional {
            write!(f, "?")?;
        }
        write!(f, "{}", self.selector)
    }
}

/// Requested project activation: included and excluded selectors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectActivation {
    pub selectors: Vec<ProjectSelector>,
}

impl ProjectActivation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of raw selector strings
    pub fn parse<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            selectors: raw
                .into_iter()
                .map(|s| ProjectSelector::parse(s.as_ref()))
                .filter(|s| !s.selector.is_empty())
                .collect(),
        }
    }

    pub fn with(mut self, selector: ProjectSelector) -> Self {
        self.selectors.push(selector);
        self
    }

    pub fn included(&self) -> impl Iterator<Item = &ProjectSelector> {
        self.selectors
            .iter()
            .filter(|s| s.kind == SelectorKind::Include)
    }

    pub fn excluded(&self) -> impl Iterator<Item = &ProjectSelector> {
        self.selectors
            .iter()
            .filter(|s| s.kind == SelectorKind::Exclude)
    }

    pub fn has_included(&self) -> bool {
        self.included().next().is_some()
    }

    pub fn has_excluded(&self) -> bool {
        self.excluded().next().is_some()
    }
}

/// Match a raw selector against a project
pub fn matches_project(selector: &str, project: &Project, base_directory: Option<&Path>) -> bool {
    if selector.contains(':') {
        let id = format!(":{}", project.artifact_id());
        if id == selector {
            return true;
        }
        return format!("{}{}", project.group_id(), id) == selector;
    }

    let Some(base) = base_directory else {
        return false;
    };
    let selected = normalize(&base.join(selector));

    if project
        .file
        .as_deref()
        .is_some_and(|file| normalize(file) == selected)
    {
        return true;
    }
    normalize(&project.basedir) == selected
}

/// Lexically normalize a path, resolving `.` and `..`
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
