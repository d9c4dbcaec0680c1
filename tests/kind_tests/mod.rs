//! Integration tests for the KServe operator
//!
//! These tests require a Kubernetes cluster (kind) and tell the story of how
//! platform operators install KServe through KServeDeployment resources.
//!
//! # Test Organization
//!
//! - `crd_operations`: creating and reading KServeDeployment resources
//!   through the Kubernetes API
//!
//! - `manifest_apply`: the create-or-update engine against a real API server
//!   (ConfigMap protection, replace of existing objects)
//!
//! - `deployment_lifecycle`: the reconciler driving a deployment to Ready or
//!   Failed using locally served component manifests
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored --test-threads=1
//! ```

mod crd_operations;
mod deployment_lifecycle;
mod helpers;
mod manifest_apply;
