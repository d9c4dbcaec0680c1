//! KServe Operator - installs KServe and its dependencies from KServeDeployment resources

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kserve_operator::component::{ComponentRegistry, DEFAULT_CERT_MANAGER_VERSION};
use kserve_operator::controller::{error_policy, reconcile, Context};
use kserve_operator::crd::KServeDeployment;
use kserve_operator::manifest::{FailurePolicy, HttpManifestFetcher};
use kserve_operator::retry::{retry_with_backoff, RetryConfig};
use kserve_operator::FIELD_MANAGER;

/// Filter used when RUST_LOG is not set
const DEFAULT_LOG_FILTER: &str = "info,kserve_operator=debug,kube=info";

/// KServe Operator - CRD-driven installation of KServe on Kubernetes
#[derive(Parser, Debug)]
#[command(name = "kserve-operator", version, about, long_about = None)]
struct Cli {
    /// Generate the CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    controller: ControllerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches KServeDeployment resources and installs the requested
    /// components.
    Controller,
}

/// Controller configuration
#[derive(Args, Debug)]
struct ControllerArgs {
    /// Directory that relative manifest paths resolve against
    #[arg(long, env = "KSERVE_OPERATOR_MANIFEST_DIR", default_value = ".")]
    manifest_dir: PathBuf,

    /// YAML file replacing the built-in component registry
    #[arg(long, env = "KSERVE_OPERATOR_COMPONENTS_FILE")]
    components_file: Option<PathBuf>,

    /// Timeout for a single manifest download in seconds
    #[arg(long, env = "KSERVE_OPERATOR_FETCH_TIMEOUT_SECS", default_value = "60")]
    fetch_timeout_secs: u64,

    /// cert-manager release used by the built-in registry
    #[arg(
        long,
        env = "KSERVE_OPERATOR_CERT_MANAGER_VERSION",
        default_value = DEFAULT_CERT_MANAGER_VERSION
    )]
    cert_manager_version: String,

    /// Log object apply failures instead of failing the component
    #[arg(long, env = "KSERVE_OPERATOR_LENIENT_APPLY")]
    lenient_apply: bool,

    /// Field manager recorded on every write
    #[arg(long, env = "KSERVE_OPERATOR_FIELD_MANAGER", default_value = FIELD_MANAGER)]
    field_manager: String,

    /// Only watch KServeDeployments in this namespace
    #[arg(long, env = "KSERVE_OPERATOR_WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// Log output format
    #[arg(long, env = "KSERVE_OPERATOR_LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&KServeDeployment::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_tracing(cli.controller.log_format);

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli.controller).await,
    }
}

/// Ensure the KServeDeployment CRD is installed
///
/// Uses server-side apply so the CRD is created or updated to this
/// version's schema.
async fn ensure_crd_installed(client: &Client, field_manager: &str) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(field_manager).force();
    let crd = KServeDeployment::crd();
    let patch = Patch::Apply(&crd);
    let name = KServeDeployment::crd_name();

    tracing::info!(crd = %name, "Installing KServeDeployment CRD...");
    retry_with_backoff(&RetryConfig::startup(), "install_crd", || {
        crds.patch(name, &params, &patch)
    })
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install KServeDeployment CRD: {}", e))?;

    tracing::info!("KServeDeployment CRD installed/updated");
    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM
fn cancel_on_shutdown(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to register SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        tracing::info!("shutdown requested, cancelling in-flight manifest fetches");
        token.cancel();
    });
}

/// Run the KServeDeployment controller
async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    tracing::info!("KServe operator starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crd_installed(&client, &args.field_manager).await?;

    let registry = match &args.components_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading component registry");
            ComponentRegistry::from_file(path)?
        }
        None => ComponentRegistry::builtin(&args.cert_manager_version),
    };
    tracing::info!(
        components = ?registry.names().collect::<Vec<_>>(),
        "Component registry ready"
    );

    let cancel = CancellationToken::new();
    cancel_on_shutdown(cancel.clone());

    let fetcher = HttpManifestFetcher::new(
        Duration::from_secs(args.fetch_timeout_secs),
        &args.manifest_dir,
        cancel,
    )?;

    let failure_policy = if args.lenient_apply {
        FailurePolicy::Lenient
    } else {
        FailurePolicy::Strict
    };

    let ctx = Arc::new(
        Context::builder(client.clone())
            .registry(Arc::new(registry))
            .fetcher(Arc::new(fetcher))
            .failure_policy(failure_policy)
            .field_manager(&args.field_manager)
            .build()?,
    );

    let deployments: Api<KServeDeployment> = match &args.watch_namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };

    tracing::info!(
        namespace = args.watch_namespace.as_deref().unwrap_or("<all>"),
        "Starting KServeDeployment controller"
    );

    Controller::new(deployments, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Deployment reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Deployment reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("Controller completed");
    Ok(())
}
