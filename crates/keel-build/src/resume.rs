//! Resumption data persisted after a failed build
use crate::error::{BuildError, BuildResult};
use crate::summary::{BuildSummary, ProjectStatus};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const RESUME_DIR: &str = ".keel";
const RESUME_FILE: &str = "resume.json";

/// Where a failed build can pick up again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumptionData {
    /// Selector (`group:artifact`) of the first failed project
    pub resume_from: Option<String>,
    /// Projects after it that did not succeed
    #[serde(default)]
    pub remaining_projects: Vec<String>,
}

impl ResumptionData {
    /// Derive resumption data from a finished build, if it failed
    pub fn from_summary(summary: &BuildSummary) -> Option<Self> {
        let outcomes = summary.outcomes();
        let first = outcomes
            .iter()
            .position(|o| matches!(o.status, ProjectStatus::Failed { .. }))?;

        let remaining_projects = outcomes[first + 1..]
            .iter()
            .filter(|o| o.status != ProjectStatus::Success)
            .map(|o| o.project.versionless_key())
            .collect();

        Some(Self {
            resume_from: Some(outcomes[first].project.versionless_key()),
            remaining_projects,
        })
    }

    /// `<root>/.keel/resume.json`
    pub fn path(root: &Path) -> PathBuf {
        root.join(RESUME_DIR).join(RESUME_FILE)
    }

    /// Load stored data; `None` when nothing was stored
    pub fn load(root: &Path) -> BuildResult<Option<Self>> {
        let path = Self::path(root);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BuildError::io(&path, e)),
        };
        let data = serde_json::from_str(&content).map_err(|e| BuildError::resumption(&path, e))?;
        Ok(Some(data))
    }

    pub fn persist(&self, root: &Path) -> BuildResult<()> {
        let path = Self::path(root);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| BuildError::resumption(&path, e))?;
        fs::write(&path, json).map_err(|e| BuildError::io(&path, e))?;

        if let Some(from) = &self.resume_from {
            info!(resume_from = %from, "resume the build with `resume = true`");
        }
        Ok(())
    }

    /// Remove stored data after a successful build
    pub fn remove(root: &Path) -> BuildResult<()> {
        let path = Self::path(root);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed resumption data");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::io(&path, e)),
        }
    }
}
