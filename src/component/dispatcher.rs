//! Per-component deployment
//!
//! Runs a component's steps in order: resolve the step's locator, fetch the
//! manifest stream, decode it and apply every object. The first failing step
//! aborts the component.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use super::registry::{ComponentRegistry, DeployStep};
use crate::crd::KServeDeployment;
use crate::manifest::{
    apply_all, decode_documents, ApplyReport, FailurePolicy, ManifestFetcher, ObjectStore,
};
use crate::Error;

/// Result of deploying one component
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Every step of the component completed
    Installed,
    /// The component is not registered; nothing was done
    Skipped,
}

/// Trait abstracting component deployment for the reconciler
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ComponentDeployer: Send + Sync {
    /// Deploy `component` for the given deployment request
    async fn deploy(
        &self,
        component: &str,
        deployment: &KServeDeployment,
    ) -> Result<DeployOutcome, Error>;
}

/// Deploys components by running their registered steps
pub struct Dispatcher {
    registry: Arc<ComponentRegistry>,
    fetcher: Arc<dyn ManifestFetcher>,
    store: Arc<dyn ObjectStore>,
    failure: FailurePolicy,
}

impl Dispatcher {
    /// Create a dispatcher with the strict failure policy
    pub fn new(
        registry: Arc<ComponentRegistry>,
        fetcher: Arc<dyn ManifestFetcher>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            store,
            failure: FailurePolicy::Strict,
        }
    }

    /// Set how object-level apply failures are treated
    pub fn with_failure_policy(mut self, failure: FailurePolicy) -> Self {
        self.failure = failure;
        self
    }

    async fn run_step(
        &self,
        step: &DeployStep,
        version: &str,
        namespace: &str,
    ) -> Result<ApplyReport, Error> {
        let locator = step.locator(version);
        debug!(step = %step.name, source = %locator, "running deployment step");

        let bytes = self.fetcher.fetch(&locator).await?;
        let policy = step.apply_policy(namespace, self.failure);
        let report = apply_all(self.store.as_ref(), decode_documents(&bytes), &policy).await?;

        if !report.failures.is_empty() {
            warn!(
                step = %step.name,
                failed = report.failures.len(),
                "step completed with object failures"
            );
        }
        Ok(report)
    }
}

#[async_trait]
impl ComponentDeployer for Dispatcher {
    async fn deploy(
        &self,
        component: &str,
        deployment: &KServeDeployment,
    ) -> Result<DeployOutcome, Error> {
        let Some(plan) = self.registry.get(component) else {
            warn!(component = %component, "unknown component, skipping");
            return Ok(DeployOutcome::Skipped);
        };

        let spec = &deployment.spec;
        for step in &plan.steps {
            let report = self
                .run_step(step, &spec.version, &spec.namespace)
                .await
                .map_err(|e| Error::component(component, &step.name, e))?;
            info!(
                component = %component,
                step = %step.name,
                created = report.created,
                replaced = report.replaced,
                unchanged = report.unchanged,
                "deployment step complete"
            );
        }

        Ok(DeployOutcome::Installed)
    }
}
