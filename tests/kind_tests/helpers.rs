//! Shared setup for kind integration tests

use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use kserve_operator::crd::KServeDeployment;

/// Namespace every test object lives in
pub const TEST_NAMESPACE: &str = "kserve-operator-test";

/// Field manager used by test setup writes
const TEST_FIELD_MANAGER: &str = "kserve-operator-test";

/// Connect to the cluster, install the CRD and create the test namespace
pub async fn ensure_test_cluster() -> anyhow::Result<Client> {
    let client = Client::try_default().await?;
    let params = PatchParams::apply(TEST_FIELD_MANAGER).force();

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let name = KServeDeployment::crd_name();
    crds.patch(name, &params, &Patch::Apply(&KServeDeployment::crd()))
        .await?;
    wait_for_crd_established(&crds, name).await?;

    let namespaces: Api<Namespace> = Api::all(client.clone());
    let namespace = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": TEST_NAMESPACE }
    });
    namespaces
        .patch(TEST_NAMESPACE, &params, &Patch::Apply(&namespace))
        .await?;

    Ok(client)
}

async fn wait_for_crd_established(
    crds: &Api<CustomResourceDefinition>,
    name: &str,
) -> anyhow::Result<()> {
    for _ in 0..30 {
        let crd = crds.get(name).await?;
        let established = crd
            .status
            .and_then(|s| s.conditions)
            .unwrap_or_default()
            .iter()
            .any(|c| c.type_ == "Established" && c.status == "True");
        if established {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    anyhow::bail!("CRD {name} was not established in time")
}
