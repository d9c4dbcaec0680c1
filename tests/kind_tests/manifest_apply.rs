//! Integration tests for the create-or-update engine
//!
//! These tests apply manifest streams through the real object store and
//! check what the API server ends up holding.

use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::api::{Api, DeleteParams};
use kube::Client;

use kserve_operator::manifest::{apply_all, decode_documents, ApplyPolicy, KubeObjectStore};

use super::helpers::{ensure_test_cluster, TEST_NAMESPACE};

fn config_map_stream(name: &str, value: &str) -> String {
    format!(
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {name}\ndata:\n  mode: {value}\n"
    )
}

fn service_stream(name: &str, port: u16) -> String {
    format!(
        "apiVersion: v1\nkind: Service\nmetadata:\n  name: {name}\nspec:\n  selector:\n    app: {name}\n  ports:\n    - port: {port}\n"
    )
}

async fn cleanup(client: &Client, name: &str) {
    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let services: Api<Service> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let _ = config_maps.delete(name, &DeleteParams::default()).await;
    let _ = services.delete(name, &DeleteParams::default()).await;
}

/// Story: Re-applying release manifests keeps a tuned ConfigMap
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_existing_config_map_survives_reapply() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let name = "test-apply-config";
    cleanup(&client, name).await;

    let store = KubeObjectStore::new(client.clone(), "kserve-operator-test");
    let policy = ApplyPolicy::new(TEST_NAMESPACE);

    let first = config_map_stream(name, "tuned");
    let report = apply_all(&store, decode_documents(first.as_bytes()), &policy)
        .await
        .expect("first apply should succeed");
    assert_eq!(report.created, 1);

    let second = config_map_stream(name, "release-default");
    let report = apply_all(&store, decode_documents(second.as_bytes()), &policy)
        .await
        .expect("second apply should succeed");
    assert_eq!(report.unchanged, 1);

    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let stored = config_maps.get(name).await.expect("config map should exist");
    assert_eq!(
        stored.data.unwrap_or_default().get("mode").map(String::as_str),
        Some("tuned")
    );

    cleanup(&client, name).await;
}

/// Story: Re-applying changes an existing object of another kind
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_existing_service_is_replaced() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let name = "test-apply-service";
    cleanup(&client, name).await;

    let store = KubeObjectStore::new(client.clone(), "kserve-operator-test");
    let policy = ApplyPolicy::new(TEST_NAMESPACE);

    let first = service_stream(name, 8080);
    apply_all(&store, decode_documents(first.as_bytes()), &policy)
        .await
        .expect("first apply should succeed");

    let second = service_stream(name, 9090);
    let report = apply_all(&store, decode_documents(second.as_bytes()), &policy)
        .await
        .expect("second apply should succeed");
    assert_eq!(report.replaced, 1);

    let services: Api<Service> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let stored = services.get(name).await.expect("service should exist");
    let ports = stored.spec.and_then(|s| s.ports).unwrap_or_default();
    assert_eq!(ports[0].port, 9090);

    cleanup(&client, name).await;
}
