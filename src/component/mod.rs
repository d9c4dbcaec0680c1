//! Components: named units of deployment (kserve, cert-manager, ...)
//!
//! - [`registry`] - Which steps make up each component
//! - [`dispatcher`] - Runs a component's steps through the manifest pipeline

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{ComponentDeployer, DeployOutcome, Dispatcher};
pub use registry::{
    ComponentPlan, ComponentRegistry, DeployStep, StepKind, CERT_MANAGER_COMPONENT,
    DEFAULT_CERT_MANAGER_VERSION, KSERVE_COMPONENT,
};

#[cfg(test)]
pub use dispatcher::MockComponentDeployer;
