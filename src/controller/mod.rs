//! Controller for the KServeDeployment CRD
//!
//! Reconciliation follows the observe-act loop: re-read the resource, deploy
//! the requested components, record the outcome on the status subresource.

mod deployment;

pub use deployment::{
    error_policy, reconcile, Context, ContextBuilder, KubeClient, KubeClientImpl,
    ERROR_REQUEUE_DELAY,
};
