//! Standard lifecycles and the phase-to-binding mapping built on them
use crate::binding::{merge_configuration, BindingOrigin, MojoBinding};
use crate::error::{PlanError, PlanResult};
use serde::{Deserialize, Serialize};

pub const CLEAN_PHASES: &[&str] = &["pre-clean", "clean", "post-clean"];

pub const DEFAULT_PHASES: &[&str] = &[
    "validate",
    "initialize",
    "generate-sources",
    "process-sources",
    "generate-resources",
    "process-resources",
    "compile",
    "process-classes",
    "generate-test-sources",
    "process-test-sources",
    "generate-test-resources",
    "process-test-resources",
    "test-compile",
    "process-test-classes",
    "test",
    "prepare-package",
    "package",
    "pre-integration-test",
    "integration-test",
    "post-integration-test",
    "verify",
    "install",
    "deploy",
];

pub const SITE_PHASES: &[&str] = &["pre-site", "site", "post-site", "site-deploy"];

/// One of the three standard lifecycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleKind {
    Clean,
    Default,
    Site,
}

impl LifecycleKind {
    pub const ALL: [LifecycleKind; 3] = [LifecycleKind::Clean, LifecycleKind::Default, LifecycleKind::Site];

    pub fn id(self) -> &'static str {
        match self {
            LifecycleKind::Clean => "clean",
            LifecycleKind::Default => "default",
            LifecycleKind::Site => "site",
        }
    }

    /// Phase names in execution order
    pub fn phases(self) -> &'static [&'static str] {
        match self {
            LifecycleKind::Clean => CLEAN_PHASES,
            LifecycleKind::Default => DEFAULT_PHASES,
            LifecycleKind::Site => SITE_PHASES,
        }
    }

    /// Lifecycle owning a phase
    pub fn for_phase(phase: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.phases().contains(&phase))
    }
}

/// Check whether a name is a phase of any standard lifecycle
pub fn is_valid_phase(phase: &str) -> bool {
    LifecycleKind::for_phase(phase).is_some()
}

/// Every valid phase name, lifecycle by lifecycle
pub fn valid_phase_names() -> impl Iterator<Item = &'static str> {
    LifecycleKind::ALL
        .into_iter()
        .flat_map(|kind| kind.phases().iter().copied())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub name: String,
    pub bindings: Vec<MojoBinding>,
}

/// Bindings of a single lifecycle, one slot per phase
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleBinding {
    kind: LifecycleKind,
    phases: Vec<Phase>,
}

impl LifecycleBinding {
    pub fn new(kind: LifecycleKind) -> Self {
        Self {
            kind,
            phases: kind
                .phases()
                .iter()
                .map(|name| Phase {
                    name: name.to_string(),
                    bindings: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn kind(&self) -> LifecycleKind {
        self.kind
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }

    fn phase_mut(&mut self, name: &str) -> Option<&mut Phase> {
        self.phases.iter_mut().find(|p| p.name == name)
    }

    /// True when no phase carries a binding
    pub fn is_empty(&self) -> bool {
        self.phases.iter().all(|p| p.bindings.is_empty())
    }

    /// Bindings of every phase up to and including `stop_phase`
    pub fn bindings_up_to(&self, stop_phase: &str) -> PlanResult<Vec<MojoBinding>> {
        let Some(index) = self.phases.iter().position(|p| p.name == stop_phase) else {
            return Err(PlanError::unknown_phase(stop_phase));
        };
        Ok(self.phases[..=index]
            .iter()
            .flat_map(|p| p.bindings.iter().cloned())
            .collect())
    }
}

/// Bindings for all three lifecycles of one project
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleBindings {
    pub packaging: Option<String>,
    clean: LifecycleBinding,
    default: LifecycleBinding,
    site: LifecycleBinding,
}

impl LifecycleBindings {
    pub fn new() -> Self {
        Self {
            packaging: None,
            clean: LifecycleBinding::new(LifecycleKind::Clean),
            default: LifecycleBinding::new(LifecycleKind::Default),
            site: LifecycleBinding::new(LifecycleKind::Site),
        }
    }

    pub fn with_packaging(mut self, packaging: impl Into<String>) -> Self {
        self.packaging = Some(packaging.into());
        self
    }

    pub fn lifecycle(&self, kind: LifecycleKind) -> &LifecycleBinding {
        match kind {
            LifecycleKind::Clean => &self.clean,
            LifecycleKind::Default => &self.default,
            LifecycleKind::Site => &self.site,
        }
    }

    fn lifecycle_mut(&mut self, kind: LifecycleKind) -> &mut LifecycleBinding {
        match kind {
            LifecycleKind::Clean => &mut self.clean,
            LifecycleKind::Default => &mut self.default,
            LifecycleKind::Site => &mut self.site,
        }
    }

    /// Lifecycle owning a phase, if the phase is known
    pub fn lifecycle_for_phase(&self, phase: &str) -> Option<&LifecycleBinding> {
        LifecycleKind::for_phase(phase).map(|kind| self.lifecycle(kind))
    }

    /// Append a binding to a phase
    pub fn add_binding(&mut self, phase: &str, binding: MojoBinding) -> PlanResult<()> {
        let kind = LifecycleKind::for_phase(phase).ok_or_else(|| PlanError::unknown_phase(phase))?;
        match self.lifecycle_mut(kind).phase_mut(phase) {
            Some(slot) => {
                slot.bindings.push(binding);
                Ok(())
            }
            None => Err(PlanError::unknown_phase(phase)),
        }
    }

    /// Ordered bindings of the phase's lifecycle up to and including the phase
    pub fn bindings_up_to(&self, phase: &str) -> PlanResult<Vec<MojoBinding>> {
        self.lifecycle_for_phase(phase)
            .ok_or_else(|| PlanError::unknown_phase(phase))?
            .bindings_up_to(phase)
    }

    /// All bindings paired with their phase, in lifecycle order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MojoBinding)> {
        LifecycleKind::ALL.into_iter().flat_map(move |kind| {
            self.lifecycle(kind)
                .phases()
                .iter()
                .flat_map(|phase| phase.bindings.iter().map(move |b| (phase.name.as_str(), b)))
        })
    }

    pub fn is_empty(&self) -> bool {
        LifecycleKind::ALL
            .into_iter()
            .all(|kind| self.lifecycle(kind).is_empty())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Find the binding matching `binding` by key; the last match wins
    pub fn find_matching(
        &self,
        binding: &MojoBinding,
        consider_execution_id: bool,
    ) -> Option<&MojoBinding> {
        let wanted = key_of(binding, consider_execution_id);
        self.iter()
            .map(|(_, candidate)| candidate)
            .filter(|candidate| key_of(candidate, consider_execution_id) == wanted)
            .last()
    }

    /// Remove every binding whose key matches one of `remove`
    pub fn remove_bindings(&mut self, remove: &[MojoBinding], consider_execution_id: bool) {
        let targets: Vec<_> = remove
            .iter()
            .map(|b| key_of(b, consider_execution_id))
            .collect();
        for kind in LifecycleKind::ALL {
            for phase in &mut self.lifecycle_mut(kind).phases {
                phase
                    .bindings
                    .retain(|b| !targets.contains(&key_of(b, consider_execution_id)));
            }
        }
    }

    /// Label bindings that carry no origin yet
    pub fn set_origin(&mut self, origin: BindingOrigin) {
        for kind in LifecycleKind::ALL {
            for phase in &mut self.lifecycle_mut(kind).phases {
                for binding in &mut phase.bindings {
                    binding.origin.get_or_insert(origin);
                }
            }
        }
    }
}

impl Default for LifecycleBindings {
    fn default() -> Self {
        Self::new()
    }
}

fn key_of(binding: &MojoBinding, consider_execution_id: bool) -> crate::binding::BindingKey {
    if consider_execution_id {
        binding.key()
    } else {
        binding.goal_key()
    }
}

/// How configurations of matching bindings combine during a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Add new bindings next to existing ones, no matching
    Append,
    /// Matching bindings merge with the new configuration dominant
    NewDominant,
    /// Matching bindings merge with the existing configuration dominant
    ExistingDominant,
}

/// Merge `new` into `existing`
///
/// Each lifecycle starts from `existing`, or from `defaults` when the existing
/// lifecycle is empty. Every binding of `new` is then added to its phase; a
/// binding matching an existing one (key with execution id) replaces it and
/// takes over its configuration according to `policy`.
pub fn merge_bindings(
    existing: &LifecycleBindings,
    new: &LifecycleBindings,
    defaults: Option<&LifecycleBindings>,
    policy: MergePolicy,
) -> LifecycleBindings {
    let mut result = LifecycleBindings::new();
    result.packaging = new.packaging.clone().or_else(|| existing.packaging.clone());

    for kind in LifecycleKind::ALL {
        let base = existing.lifecycle(kind);
        *result.lifecycle_mut(kind) = match defaults {
            Some(defaults) if base.is_empty() => defaults.lifecycle(kind).clone(),
            _ => base.clone(),
        };
    }

    for kind in LifecycleKind::ALL {
        for (index, phase) in new.lifecycle(kind).phases().iter().enumerate() {
            for binding in &phase.bindings {
                let mut binding = binding.clone();

                if policy != MergePolicy::Append {
                    if let Some(matching) = existing.find_matching(&binding, true) {
                        binding.configuration = match policy {
                            MergePolicy::ExistingDominant => {
                                merge_configuration(&matching.configuration, &binding.configuration)
                            }
                            _ => merge_configuration(&binding.configuration, &matching.configuration),
                        };
                        if binding.origin.is_none() {
                            binding.origin = matching.origin;
                        }
                        let matching = matching.clone();
                        result.remove_bindings(std::slice::from_ref(&matching), true);
                    }
                }

                result.lifecycle_mut(kind).phases[index].bindings.push(binding);
            }
        }
    }

    result
}
