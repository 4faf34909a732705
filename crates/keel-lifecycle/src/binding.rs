//! Mojo bindings: one plugin goal invocation bound to a phase or requested directly
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Execution id used when a binding does not name one
pub const DEFAULT_EXECUTION_ID: &str = "default";

/// Composite identity of a binding: `group:artifact:goal[:executionId]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingKey {
    pub group_id: String,
    pub artifact_id: String,
    pub goal: String,
    pub execution_id: Option<String>,
}

impl BindingKey {
    /// The same key with the execution id dropped
    pub fn without_execution(&self) -> Self {
        Self {
            execution_id: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.goal)?;
        if let Some(execution) = &self.execution_id {
            write!(f, ":{execution}")?;
        }
        Ok(())
    }
}

/// Where a binding came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingOrigin {
    /// Core lifecycle defaults
    Default,
    /// Packaging lifecycle mapping
    Packaging,
    /// Declared in the project descriptor
    Project,
    /// Requested on the command line
    DirectInvocation,
    /// Single goal run ahead of the goal that referenced it
    ForkedGoal,
    /// Report generation injected ahead of a report consumer
    Report,
    /// Contributed by a plugin lifecycle overlay
    Overlay,
}

impl fmt::Display for BindingOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingOrigin::Default => "default",
            BindingOrigin::Packaging => "packaging",
            BindingOrigin::Project => "project",
            BindingOrigin::DirectInvocation => "direct invocation",
            BindingOrigin::ForkedGoal => "forked goal",
            BindingOrigin::Report => "report",
            BindingOrigin::Overlay => "overlay",
        };
        write!(f, "{name}")
    }
}

/// One plugin goal execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MojoBinding {
    pub group_id: String,
    pub artifact_id: String,
    /// Plugin version; `None` means the loader picks one
    #[serde(default)]
    pub version: Option<String>,
    pub goal: String,
    #[serde(default = "default_execution_id")]
    pub execution_id: String,
    /// Goal configuration as a JSON tree
    #[serde(default)]
    pub configuration: Value,
    #[serde(default)]
    pub origin: Option<BindingOrigin>,
    #[serde(default)]
    pub origin_description: Option<String>,
}

fn default_execution_id() -> String {
    DEFAULT_EXECUTION_ID.to_string()
}

impl MojoBinding {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        goal: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: None,
            goal: goal.into(),
            execution_id: default_execution_id(),
            configuration: Value::Null,
            origin: None,
            origin_description: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = execution_id.into();
        self
    }

    pub fn with_configuration(mut self, configuration: Value) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn with_origin(mut self, origin: BindingOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_origin_description(mut self, description: impl Into<String>) -> Self {
        self.origin_description = Some(description.into());
        self
    }

    /// Key including the execution id
    pub fn key(&self) -> BindingKey {
        BindingKey {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            goal: self.goal.clone(),
            execution_id: Some(self.execution_id.clone()),
        }
    }

    /// Key ignoring the execution id
    pub fn goal_key(&self) -> BindingKey {
        BindingKey {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            goal: self.goal.clone(),
            execution_id: None,
        }
    }

    /// `group:artifact[:version]` of the owning plugin
    pub fn plugin_key(&self) -> String {
        match &self.version {
            Some(version) => format!("{}:{}:{}", self.group_id, self.artifact_id, version),
            None => format!("{}:{}", self.group_id, self.artifact_id),
        }
    }
}

impl fmt::Display for MojoBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plugin_key(), self.goal)?;
        if self.execution_id != DEFAULT_EXECUTION_ID {
            write!(f, " (execution: {})", self.execution_id)?;
        }
        Ok(())
    }
}

/// Deep-merge two configuration trees
///
/// Objects merge key by key; anywhere else the dominant value wins unless it
/// is null.
pub fn merge_configuration(dominant: &Value, recessive: &Value) -> Value {
    match (dominant, recessive) {
        (Value::Object(dom), Value::Object(rec)) => {
            let mut merged = rec.clone();
            for (key, value) in dom {
                let entry = match rec.get(key) {
                    Some(existing) => merge_configuration(value, existing),
                    None => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        (Value::Null, other) => other.clone(),
        (dom, _) => dom.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_key_display() {
        let binding = MojoBinding::new("org.keel", "keel-compiler-plugin", "compile")
            .with_execution_id("extra");
        assert_eq!(
            binding.key().to_string(),
            "org.keel:keel-compiler-plugin:compile:extra"
        );
        assert_eq!(
            binding.goal_key().to_string(),
            "org.keel:keel-compiler-plugin:compile"
        );
        assert_eq!(binding.key().without_execution(), binding.goal_key());
    }

    #[test]
    fn test_binding_display() {
        let plain = MojoBinding::new("g", "a", "run").with_version("2.0");
        assert_eq!(plain.to_string(), "g:a:2.0:run");

        let named = MojoBinding::new("g", "a", "run").with_execution_id("second");
        assert_eq!(named.to_string(), "g:a:run (execution: second)");
    }

    #[test]
    fn test_merge_configuration_dominant_wins() {
        let dominant = json!({ "source": "17", "flags": { "debug": true } });
        let recessive = json!({ "source": "11", "target": "11", "flags": { "debug": false, "lint": "all" } });

        let merged = merge_configuration(&dominant, &recessive);
        assert_eq!(
            merged,
            json!({
                "source": "17",
                "target": "11",
                "flags": { "debug": true, "lint": "all" }
            })
        );
    }

    #[test]
    fn test_merge_configuration_null_is_recessive() {
        let recessive = json!({ "skip": true });
        assert_eq!(merge_configuration(&Value::Null, &recessive), recessive);
        assert_eq!(merge_configuration(&json!([1, 2]), &recessive), json!([1, 2]));
    }

    #[test]
    fn test_binding_deserializes_with_defaults() {
        let binding: MojoBinding = serde_json::from_value(json!({
            "group_id": "org.keel",
            "artifact_id": "keel-jar-plugin",
            "goal": "jar"
        }))
        .unwrap();
        assert_eq!(binding.execution_id, DEFAULT_EXECUTION_ID);
        assert_eq!(binding.configuration, Value::Null);
        assert!(binding.origin.is_none());
    }
}
