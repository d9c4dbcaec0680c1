//! Component registry: which manifests make up each named component
//!
//! The registry is built once at startup, either from the built-in table or
//! from a YAML file, and shared read-only by every reconciliation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::manifest::{ApplyPolicy, FailurePolicy, ManifestLocator};
use crate::Error;

/// Component name for KServe itself
pub const KSERVE_COMPONENT: &str = "kserve";

/// Component name for cert-manager
pub const CERT_MANAGER_COMPONENT: &str = "cert-manager";

/// cert-manager release installed by the built-in registry
pub const DEFAULT_CERT_MANAGER_VERSION: &str = "v1.13.0";

/// KServe release manifest; `{version}` is the requested KServe version
pub const KSERVE_MANIFEST_URL: &str =
    "https://github.com/kserve/kserve/releases/download/{version}/kserve.yaml";

/// Local patch switching KServe to RawDeployment mode
pub const RAW_DEPLOYMENT_PATCH: &str = "config/kserve-rawdeployment-patch.yaml";

/// Local sample InferenceService deployed once KServe is configured
pub const SAMPLE_INFERENCE_SERVICE: &str = "config/samples/gemma2-inferenceservice.yaml";

/// Placeholder replaced with `spec.version` in step sources
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// How a step's manifests are treated when applied
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    /// Release manifests; existing ConfigMaps are preserved
    Manifests,
    /// Configuration overrides; existing ConfigMaps are replaced
    ConfigPatch,
    /// Workloads that depend on the component's CRDs
    DependentWorkload,
}

/// One deployment step of a component
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStep {
    /// Step name, used in logs and failure messages
    pub name: String,
    /// How the step's objects are applied
    pub kind: StepKind,
    /// URL or path template for the step's manifest stream
    pub source: String,
}

impl DeployStep {
    /// Create a step
    pub fn new(name: impl Into<String>, kind: StepKind, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            source: source.into(),
        }
    }

    /// Resolve the manifest locator for a requested version
    pub fn locator(&self, version: &str) -> ManifestLocator {
        ManifestLocator::parse(&self.source.replace(VERSION_PLACEHOLDER, version))
    }

    /// Apply policy for this step's objects
    pub fn apply_policy(&self, namespace: &str, failure: FailurePolicy) -> ApplyPolicy {
        ApplyPolicy::new(namespace)
            .with_config_map_protection(self.kind != StepKind::ConfigPatch)
            .with_failure_policy(failure)
    }
}

/// Ordered deployment steps of one component
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ComponentPlan {
    /// Steps, executed in order
    pub steps: Vec<DeployStep>,
}

impl ComponentPlan {
    /// Create a plan from its steps
    pub fn new(steps: Vec<DeployStep>) -> Self {
        Self { steps }
    }
}

/// Mapping from component name to its deployment plan
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ComponentRegistry {
    components: BTreeMap<String, ComponentPlan>,
}

impl ComponentRegistry {
    /// Built-in registry: KServe and cert-manager
    pub fn builtin(cert_manager_version: &str) -> Self {
        let mut components = BTreeMap::new();
        components.insert(
            KSERVE_COMPONENT.to_string(),
            ComponentPlan::new(vec![
                DeployStep::new("kserve-manifests", StepKind::Manifests, KSERVE_MANIFEST_URL),
                DeployStep::new(
                    "raw-deployment-config",
                    StepKind::ConfigPatch,
                    RAW_DEPLOYMENT_PATCH,
                ),
                DeployStep::new(
                    "sample-inference-service",
                    StepKind::DependentWorkload,
                    SAMPLE_INFERENCE_SERVICE,
                ),
            ]),
        );
        components.insert(
            CERT_MANAGER_COMPONENT.to_string(),
            ComponentPlan::new(vec![DeployStep::new(
                "cert-manager-manifests",
                StepKind::Manifests,
                format!(
                    "https://github.com/cert-manager/cert-manager/releases/download/{cert_manager_version}/cert-manager.yaml"
                ),
            )]),
        );
        Self { components }
    }

    /// Parse a registry from YAML
    ///
    /// ```yaml
    /// components:
    ///   kserve:
    ///     - name: kserve-manifests
    ///       kind: manifests
    ///       source: https://github.com/kserve/kserve/releases/download/{version}/kserve.yaml
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let registry: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::serialization(format!("invalid components file: {e}")))?;
        registry.validate()?;
        Ok(registry)
    }

    /// Load a registry from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::validation(format!(
                "failed to read components file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&yaml)
    }

    fn validate(&self) -> Result<(), Error> {
        for (component, plan) in &self.components {
            if component.trim().is_empty() {
                return Err(Error::validation("component names must not be empty"));
            }
            for step in &plan.steps {
                if step.name.trim().is_empty() || step.source.trim().is_empty() {
                    return Err(Error::validation(format!(
                        "component {component} has a step without name or source"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Plan for a component, if registered
    pub fn get(&self, component: &str) -> Option<&ComponentPlan> {
        self.components.get(component)
    }

    /// Registered component names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }
}
