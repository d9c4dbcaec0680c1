//! KServeDeployment Custom Resource Definition
//!
//! A KServeDeployment requests an ordered set of components (KServe itself,
//! cert-manager, ...) at a target version. The controller owns the status
//! subresource and never writes the spec.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, ConditionStatus, DeploymentPhase, KServeConfig};

/// Namespace KServe is installed into when the spec does not name one
pub const DEFAULT_KSERVE_NAMESPACE: &str = "kserve";

/// Condition type written by the controller
pub const CONDITION_READY: &str = "Ready";

fn default_namespace() -> String {
    DEFAULT_KSERVE_NAMESPACE.to_string()
}

/// Specification for a KServeDeployment
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "platform.ai-platform.io",
    version = "v1alpha1",
    kind = "KServeDeployment",
    plural = "kservedeployments",
    shortname = "ksd",
    namespaced,
    status = "KServeDeploymentStatus",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KServeDeploymentSpec {
    /// Version of KServe to deploy (e.g. v0.11.0)
    pub version: String,

    /// Components to deploy, in order (kserve, cert-manager, ...)
    #[serde(default)]
    pub components: Vec<String>,

    /// Namespace where KServe will be installed
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Configuration for KServe components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<KServeConfig>,
}

impl KServeDeploymentSpec {
    /// Validate the deployment specification
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.version.trim().is_empty() {
            return Err(crate::Error::validation("spec.version must not be empty"));
        }
        if self.components.iter().any(|c| c.trim().is_empty()) {
            return Err(crate::Error::validation(
                "spec.components must not contain empty names",
            ));
        }
        Ok(())
    }
}

/// Status for a KServeDeployment
///
/// `installedVersion` and `installedComponents` are always serialized so a
/// merge patch clears values left behind by an earlier pass.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KServeDeploymentStatus {
    /// Phase of the deployment (Pending, Installing, Ready, Failed)
    #[serde(default)]
    pub phase: DeploymentPhase,

    /// Latest observations; holds exactly one Ready condition
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Currently installed version
    #[serde(default)]
    pub installed_version: String,

    /// Successfully installed components, in install order
    #[serde(default)]
    pub installed_components: Vec<String>,

    /// When the controller last wrote this status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl KServeDeploymentStatus {
    /// Build the status written at the end of (or during) a reconciliation pass
    ///
    /// The Ready condition replaces any previous conditions. Its status is
    /// `True` only for the Ready phase.
    pub fn for_phase(
        phase: DeploymentPhase,
        generation: i64,
        installed_version: impl Into<String>,
        installed_components: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        let condition_status = if phase == DeploymentPhase::Ready {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        };
        let condition = Condition::new(
            CONDITION_READY,
            condition_status,
            generation,
            phase.as_str(),
            message,
        );

        Self {
            phase,
            conditions: vec![condition],
            installed_version: installed_version.into(),
            installed_components,
            last_updated: Some(Utc::now()),
        }
    }

    /// The Ready condition, if one has been written
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == CONDITION_READY)
    }
}

impl KServeDeployment {
    /// Current phase, treating a missing status as Pending
    pub fn phase(&self) -> DeploymentPhase {
        self.status
            .as_ref()
            .map(|s| s.phase.clone())
            .unwrap_or_default()
    }
}
