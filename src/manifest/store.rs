//! Cluster object store access for untyped manifest objects
//!
//! [`ObjectStore`] is the seam the apply engine talks to. [`KubeObjectStore`]
//! implements it with kube-rs `DynamicObject` APIs, resolving each
//! apiVersion/kind through API discovery.

use std::collections::HashMap;

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, PostParams};
use kube::core::GroupVersionKind;
use kube::discovery::{ApiResource, Scope};
use kube::Client;
use tokio::sync::Mutex;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use super::ManifestDocument;
use crate::Error;

/// Trait abstracting create/get/replace of untyped objects
///
/// Errors keep the API status code so callers can tell AlreadyExists and
/// NotFound apart (see [`Error::is_already_exists`]).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether objects of this document's kind live in a namespace
    async fn is_namespaced(&self, doc: &ManifestDocument) -> Result<bool, Error>;

    /// Create the object as given
    async fn create(&self, doc: &ManifestDocument) -> Result<(), Error>;

    /// Fetch the stored object with the same kind, namespace and name
    async fn get(&self, doc: &ManifestDocument) -> Result<DynamicObject, Error>;

    /// Replace the stored object with the document's full content
    async fn replace(&self, doc: &ManifestDocument) -> Result<(), Error>;
}

#[derive(Clone, Debug)]
struct ResolvedResource {
    api_resource: ApiResource,
    namespaced: bool,
}

/// Object store backed by the Kubernetes API server
pub struct KubeObjectStore {
    client: Client,
    field_manager: String,
    resources: Mutex<HashMap<String, ResolvedResource>>,
}

impl KubeObjectStore {
    /// Create a store using `field_manager` for every write
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
            resources: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the API resource for a document's apiVersion/kind.
    ///
    /// Only successful discovery results are cached, so a CRD applied earlier
    /// in the same stream resolves once the API server serves it.
    async fn resolve(&self, doc: &ManifestDocument) -> ResolvedResource {
        let key = format!("{}/{}", doc.api_version(), doc.kind());
        if let Some(hit) = self.resources.lock().await.get(&key) {
            return hit.clone();
        }

        let (group, version) = parse_api_version(doc.api_version());
        let gvk = GroupVersionKind::gvk(&group, &version, doc.kind());

        match kube::discovery::pinned_kind(&self.client, &gvk).await {
            Ok((api_resource, caps)) => {
                let resolved = ResolvedResource {
                    api_resource,
                    namespaced: matches!(caps.scope, Scope::Namespaced),
                };
                self.resources.lock().await.insert(key, resolved.clone());
                resolved
            }
            Err(e) => {
                debug!(
                    api_version = %doc.api_version(),
                    kind = %doc.kind(),
                    error = %e,
                    "resource not found in discovery, using fallback pluralization"
                );
                ResolvedResource {
                    api_resource: build_api_resource(doc.api_version(), doc.kind()),
                    namespaced: doc.namespace().is_some(),
                }
            }
        }
    }

    async fn api_for(&self, doc: &ManifestDocument) -> (Api<DynamicObject>, bool) {
        let resolved = self.resolve(doc).await;
        let api = if resolved.namespaced {
            let namespace = doc.namespace().unwrap_or("default");
            Api::namespaced_with(self.client.clone(), namespace, &resolved.api_resource)
        } else {
            Api::all_with(self.client.clone(), &resolved.api_resource)
        };
        (api, resolved.namespaced)
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

/// The object body to send, without a namespace for cluster-scoped kinds
fn body_for(doc: &ManifestDocument, namespaced: bool) -> DynamicObject {
    let mut object = doc.object().clone();
    if !namespaced {
        object.metadata.namespace = None;
    }
    object
}

fn require_name(doc: &ManifestDocument) -> Result<String, Error> {
    let name = doc.name();
    if name.is_empty() {
        return Err(Error::validation(format!(
            "{} has no metadata.name",
            doc.kind()
        )));
    }
    Ok(name)
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn is_namespaced(&self, doc: &ManifestDocument) -> Result<bool, Error> {
        Ok(self.resolve(doc).await.namespaced)
    }

    async fn create(&self, doc: &ManifestDocument) -> Result<(), Error> {
        let (api, namespaced) = self.api_for(doc).await;
        api.create(&self.post_params(), &body_for(doc, namespaced))
            .await?;
        Ok(())
    }

    async fn get(&self, doc: &ManifestDocument) -> Result<DynamicObject, Error> {
        let name = require_name(doc)?;
        let (api, _) = self.api_for(doc).await;
        Ok(api.get(&name).await?)
    }

    async fn replace(&self, doc: &ManifestDocument) -> Result<(), Error> {
        let name = require_name(doc)?;
        let (api, namespaced) = self.api_for(doc).await;
        api.replace(&name, &self.post_params(), &body_for(doc, namespaced))
            .await?;
        Ok(())
    }
}

/// Parse apiVersion into (group, version); the core group is empty
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.rsplit_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an ApiResource from an apiVersion and kind without discovery
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Kinds whose plural does not follow the suffix rules below
const IRREGULAR_PLURALS: &[(&str, &str)] = &[("endpoints", "endpoints")];

/// Convert a Kind to its plural resource name
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();

    if let Some((_, plural)) = IRREGULAR_PLURALS.iter().find(|(s, _)| *s == lower) {
        return (*plural).to_string();
    }

    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}
