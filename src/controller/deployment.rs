//! KServeDeployment controller implementation
//!
//! A reconciliation pass re-reads the resource, checkpoints the Installing
//! phase, deploys every requested component in order and writes a terminal
//! Ready or Failed status. Phase is not a guard: every pass re-applies every
//! component, which makes a pass idempotent rather than skipped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::component::{ComponentDeployer, ComponentRegistry, DeployOutcome, Dispatcher};
use crate::crd::{DeploymentPhase, KServeDeployment, KServeDeploymentStatus};
use crate::manifest::source::DEFAULT_FETCH_TIMEOUT;
use crate::manifest::{FailurePolicy, HttpManifestFetcher, KubeObjectStore, ManifestFetcher};
use crate::{Error, FIELD_MANAGER};

/// Delay before retrying a pass that returned an error
pub const ERROR_REQUEUE_DELAY: Duration = Duration::from_secs(5);

/// Trait abstracting Kubernetes client operations for KServeDeployment
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Fetch the current state of a KServeDeployment
    ///
    /// Returns `None` when the resource no longer exists.
    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<KServeDeployment>, Error>;

    /// Patch the status of a KServeDeployment
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the deployment to update
    /// * `namespace` - Namespace of the deployment
    /// * `status` - New status to apply
    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &KServeDeploymentStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
    field_manager: String,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<KServeDeployment>, Error> {
        let api: Api<KServeDeployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &KServeDeploymentStatus,
    ) -> Result<(), Error> {
        let api: Api<KServeDeployment> = Api::namespaced(self.client.clone(), namespace);

        let status_patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            name,
            &PatchParams::apply(&self.field_manager),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}

/// Controller context containing shared state and clients
///
/// The context is shared across all reconciliation calls. Use
/// [`ContextBuilder`] to construct instances:
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .registry(Arc::new(ComponentRegistry::builtin("v1.13.0")))
///     .fetcher(Arc::new(fetcher))
///     .build()?;
/// ```
pub struct Context {
    /// Kubernetes client for the KServeDeployment resource
    pub kube: Arc<dyn KubeClient>,
    /// Deploys a single named component
    pub deployer: Arc<dyn ComponentDeployer>,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context for testing with custom mock clients
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>, deployer: Arc<dyn ComponentDeployer>) -> Self {
        Self { kube, deployer }
    }
}

/// Builder for constructing [`Context`] instances
pub struct ContextBuilder {
    client: Client,
    kube: Option<Arc<dyn KubeClient>>,
    deployer: Option<Arc<dyn ComponentDeployer>>,
    registry: Option<Arc<ComponentRegistry>>,
    fetcher: Option<Arc<dyn ManifestFetcher>>,
    failure: FailurePolicy,
    field_manager: String,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            kube: None,
            deployer: None,
            registry: None,
            fetcher: None,
            failure: FailurePolicy::Strict,
            field_manager: FIELD_MANAGER.to_string(),
        }
    }

    /// Set the component registry (defaults to the built-in registry)
    pub fn registry(mut self, registry: Arc<ComponentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the manifest fetcher
    pub fn fetcher(mut self, fetcher: Arc<dyn ManifestFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set how object-level apply failures are treated
    pub fn failure_policy(mut self, failure: FailurePolicy) -> Self {
        self.failure = failure;
        self
    }

    /// Set the field manager used for every write
    pub fn field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    /// Override the Kubernetes client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Override the component deployer (primarily for testing)
    pub fn deployer(mut self, deployer: Arc<dyn ComponentDeployer>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    /// Build the Context
    pub fn build(self) -> Result<Context, Error> {
        let kube: Arc<dyn KubeClient> = match self.kube {
            Some(kube) => kube,
            None => Arc::new(KubeClientImpl::new(
                self.client.clone(),
                self.field_manager.clone(),
            )),
        };

        let deployer: Arc<dyn ComponentDeployer> = match self.deployer {
            Some(deployer) => deployer,
            None => {
                let registry = self.registry.unwrap_or_else(|| {
                    Arc::new(ComponentRegistry::builtin(
                        crate::component::DEFAULT_CERT_MANAGER_VERSION,
                    ))
                });
                let fetcher: Arc<dyn ManifestFetcher> = match self.fetcher {
                    Some(fetcher) => fetcher,
                    None => Arc::new(HttpManifestFetcher::new(
                        DEFAULT_FETCH_TIMEOUT,
                        ".",
                        tokio_util::sync::CancellationToken::new(),
                    )?),
                };
                let store = Arc::new(KubeObjectStore::new(self.client, self.field_manager));
                Arc::new(Dispatcher::new(registry, fetcher, store).with_failure_policy(self.failure))
            }
        };

        Ok(Context { kube, deployer })
    }
}

/// Reconcile a KServeDeployment resource
///
/// # Arguments
///
/// * `deployment` - The KServeDeployment delivered by the controller
/// * `ctx` - Shared controller context
///
/// # Returns
///
/// `Action::await_change()` once a terminal status is written; the next pass
/// is triggered by a change to the resource. Errors are only returned when
/// the resource could not be read or its status could not be written.
#[instrument(
    skip(deployment, ctx),
    fields(deployment = %deployment.name_any(), namespace = %deployment.namespace().unwrap_or_default())
)]
pub async fn reconcile(
    deployment: Arc<KServeDeployment>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let name = deployment.name_any();
    let namespace = deployment.namespace().unwrap_or_default();
    info!("reconciling KServe deployment");

    // Work from the stored object, not the cached event payload
    let Some(current) = ctx.kube.get_deployment(&name, &namespace).await? else {
        debug!("deployment no longer exists, nothing to do");
        return Ok(Action::await_change());
    };

    if let Err(e) = current.spec.validate() {
        warn!(error = %e, "deployment validation failed");
        let message = format!("KServe deployment failed: {e}");
        update_status(&current, &ctx, DeploymentPhase::Failed, "", vec![], &message).await?;
        return Ok(Action::await_change());
    }

    let current_phase = current.phase();
    debug!(?current_phase, "current deployment phase");

    if current_phase == DeploymentPhase::Pending {
        let message = format!("KServe deployment is {}", DeploymentPhase::Installing);
        let written =
            update_status(&current, &ctx, DeploymentPhase::Installing, "", vec![], &message)
                .await?;
        if !written {
            return Ok(Action::await_change());
        }
    }

    let mut installed = Vec::with_capacity(current.spec.components.len());
    for component in &current.spec.components {
        info!(component = %component, "deploying component");

        match ctx.deployer.deploy(component, &current).await {
            Ok(DeployOutcome::Installed) => installed.push(component.clone()),
            Ok(DeployOutcome::Skipped) => {
                debug!(component = %component, "component skipped");
            }
            Err(e) => {
                error!(component = %component, error = %e, "component deployment failed");
                let message = format!("KServe deployment failed: {e}");
                // Nothing of the requested version is known to be installed
                update_status(&current, &ctx, DeploymentPhase::Failed, "", installed, &message)
                    .await?;
                // A spec change triggers the next attempt
                return Ok(Action::await_change());
            }
        }
    }

    let message = format!("KServe deployment is {}", DeploymentPhase::Ready);
    update_status(
        &current,
        &ctx,
        DeploymentPhase::Ready,
        &current.spec.version,
        installed,
        &message,
    )
    .await?;

    Ok(Action::await_change())
}

/// Error policy for the controller
///
/// Called when reconciliation returns an error; requeues after a fixed delay.
pub fn error_policy(
    deployment: Arc<KServeDeployment>,
    error: &Error,
    _ctx: Arc<Context>,
) -> Action {
    error!(
        ?error,
        deployment = %deployment.name_any(),
        "reconciliation failed"
    );

    Action::requeue(ERROR_REQUEUE_DELAY)
}

/// Write a status with a single Ready condition for `phase`
///
/// Returns `false` when the resource was deleted before the write landed.
async fn update_status(
    deployment: &KServeDeployment,
    ctx: &Context,
    phase: DeploymentPhase,
    installed_version: &str,
    installed_components: Vec<String>,
    message: &str,
) -> Result<bool, Error> {
    let name = deployment.name_any();
    let namespace = deployment.namespace().unwrap_or_default();
    let generation = deployment.metadata.generation.unwrap_or_default();

    let status = KServeDeploymentStatus::for_phase(
        phase.clone(),
        generation,
        installed_version,
        installed_components,
        message,
    );

    match ctx.kube.patch_status(&name, &namespace, &status).await {
        Ok(()) => {
            info!(%phase, "updated status");
            Ok(true)
        }
        Err(e) if e.is_not_found() => {
            debug!(%phase, "deployment deleted before status write");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
