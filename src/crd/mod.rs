//! Custom Resource Definitions for the KServe operator

mod deployment;
mod types;

pub use deployment::{
    KServeDeployment, KServeDeploymentSpec, KServeDeploymentStatus, CONDITION_READY,
    DEFAULT_KSERVE_NAMESPACE,
};
pub use types::{Condition, ConditionStatus, DeploymentPhase, KServeConfig};
