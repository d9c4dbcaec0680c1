//! Integration tests for CRD operations
//!
//! These tests tell the story of how users interact with KServeDeployment
//! resources through the Kubernetes API.

use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;

use kserve_operator::crd::{DeploymentPhase, KServeDeployment, KServeDeploymentStatus};

use super::helpers::{ensure_test_cluster, TEST_NAMESPACE};

const SAMPLE: &str = include_str!("../../config/samples/kservedeployment.yaml");

/// Load the shipped sample, renamed and moved into the test namespace
fn sample_deployment(name: &str) -> KServeDeployment {
    let mut deployment: KServeDeployment =
        serde_yaml::from_str(SAMPLE).expect("sample should parse");
    deployment.metadata.name = Some(name.to_string());
    deployment.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    deployment
}

async fn cleanup_deployment(client: &Client, name: &str) {
    let api: Api<KServeDeployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// Story: Platform operator submits the sample KServeDeployment
///
/// The spec is persisted exactly as written, including component order,
/// and a new resource has no status until the controller writes one.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_operator_creates_kserve_deployment() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<KServeDeployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "test-ksd-create";
    cleanup_deployment(&client, name).await;

    api.create(&PostParams::default(), &sample_deployment(name))
        .await
        .expect("failed to create deployment");

    let fetched = api.get(name).await.expect("failed to get deployment");
    assert_eq!(fetched.spec.version, "v0.11.0");
    assert_eq!(fetched.spec.components, vec!["cert-manager", "kserve"]);
    assert_eq!(fetched.spec.namespace, "kserve");
    assert_eq!(
        fetched.spec.config.as_ref().and_then(|c| c.ingress_domain.as_deref()),
        Some("example.com")
    );
    assert_eq!(fetched.phase(), DeploymentPhase::Pending);

    cleanup_deployment(&client, name).await;
}

/// Story: The status subresource round-trips through a merge patch
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_status_subresource_accepts_controller_status() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<KServeDeployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "test-ksd-status";
    cleanup_deployment(&client, name).await;

    api.create(&PostParams::default(), &sample_deployment(name))
        .await
        .expect("failed to create deployment");

    let status = KServeDeploymentStatus::for_phase(
        DeploymentPhase::Ready,
        1,
        "v0.11.0",
        vec!["cert-manager".to_string(), "kserve".to_string()],
        "KServe deployment is Ready",
    );
    api.patch_status(
        name,
        &PatchParams::apply("kserve-operator-test"),
        &Patch::Merge(&serde_json::json!({ "status": status })),
    )
    .await
    .expect("failed to patch status");

    let fetched = api.get(name).await.expect("failed to get deployment");
    let stored = fetched.status.expect("status should be stored");
    assert_eq!(stored.phase, DeploymentPhase::Ready);
    assert_eq!(stored.installed_version, "v0.11.0");
    assert_eq!(stored.installed_components, vec!["cert-manager", "kserve"]);
    assert_eq!(stored.conditions.len(), 1);

    cleanup_deployment(&client, name).await;
}
