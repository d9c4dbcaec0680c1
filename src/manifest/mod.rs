//! Manifest pipeline: fetch raw documents, decode them, apply them to the cluster
//!
//! - [`source`] - Retrieve manifest bytes from a URL or a local path
//! - [`decode`] - Split a multi-document YAML/JSON stream into objects
//! - [`store`] - The cluster object store seam (create/get/replace)
//! - [`apply`] - Create-or-update policy applied to every decoded object

pub mod apply;
pub mod decode;
pub mod source;
pub mod store;

pub use apply::{apply_all, apply_document, ApplyOutcome, ApplyPolicy, ApplyReport, FailurePolicy};
pub use decode::{decode_documents, DocumentDecoder};
pub use source::{HttpManifestFetcher, ManifestFetcher, ManifestLocator};
pub use store::{KubeObjectStore, ObjectStore};

use kube::api::DynamicObject;
use kube::ResourceExt;

/// Kind protected from overwrite once it exists in the cluster
pub const CONFIG_MAP_KIND: &str = "ConfigMap";

/// A single decoded object from a manifest stream
///
/// Wraps the untyped object and guarantees `apiVersion` and `kind` are set.
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestDocument {
    api_version: String,
    kind: String,
    object: DynamicObject,
}

impl ManifestDocument {
    /// Build a document from a decoded JSON value
    ///
    /// Fails when the value is not an object or lacks `apiVersion`/`kind`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, crate::Error> {
        if !value.is_object() {
            return Err(crate::Error::decode("document is not a mapping"));
        }
        let object: DynamicObject = serde_json::from_value(value)
            .map_err(|e| crate::Error::decode(format!("invalid object: {e}")))?;

        let types = object
            .types
            .clone()
            .ok_or_else(|| crate::Error::decode("object is missing apiVersion or kind"))?;
        if types.api_version.is_empty() || types.kind.is_empty() {
            return Err(crate::Error::decode("object has empty apiVersion or kind"));
        }

        Ok(Self {
            api_version: types.api_version,
            kind: types.kind,
            object,
        })
    }

    /// Full API version (e.g. "apps/v1", "v1")
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Resource kind (e.g. "Deployment")
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// API group, empty for the core group
    pub fn group(&self) -> &str {
        self.api_version
            .rsplit_once('/')
            .map(|(group, _)| group)
            .unwrap_or("")
    }

    /// Object name, empty when the manifest does not set one
    pub fn name(&self) -> String {
        self.object.name_any()
    }

    /// Namespace from the manifest metadata
    pub fn namespace(&self) -> Option<&str> {
        self.object.metadata.namespace.as_deref()
    }

    /// True for core-group ConfigMaps
    pub fn is_config_map(&self) -> bool {
        self.kind == CONFIG_MAP_KIND && self.group().is_empty()
    }

    /// The untyped object to send to the API server
    pub fn object(&self) -> &DynamicObject {
        &self.object
    }

    /// Set the namespace when the manifest leaves it empty
    pub fn default_namespace(&mut self, namespace: &str) {
        if self.object.metadata.namespace.is_none() {
            self.object.metadata.namespace = Some(namespace.to_string());
        }
    }

    /// Carry over the optimistic concurrency token of the stored object
    pub fn set_resource_version(&mut self, resource_version: Option<String>) {
        self.object.metadata.resource_version = resource_version;
    }

    /// Short "Kind namespace/name" description for logs and reports
    pub fn describe(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{} {}/{}", self.kind, ns, self.name()),
            None => format!("{} {}", self.kind, self.name()),
        }
    }
}

/// Failure to apply a single object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectFailure {
    /// Kind of the object
    pub kind: String,
    /// Name of the object
    pub name: String,
    /// Namespace of the object, if namespaced
    pub namespace: Option<String>,
    /// Error returned by the API server
    pub message: String,
}

impl ObjectFailure {
    /// Create a failure record
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.map(str::to_string),
            message: message.into(),
        }
    }

    fn for_document(doc: &ManifestDocument, error: &crate::Error) -> Self {
        Self::new(doc.kind(), doc.name(), doc.namespace(), error.to_string())
    }
}

impl std::fmt::Display for ObjectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}: {}", self.kind, ns, self.name, self.message),
            None => write!(f, "{} {}: {}", self.kind, self.name, self.message),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_document(kind: &str, name: &str, namespace: Option<&str>) -> ManifestDocument {
    let api_version = match kind {
        "Deployment" => "apps/v1",
        "InferenceService" => "serving.kserve.io/v1beta1",
        "CustomResourceDefinition" => "apiextensions.k8s.io/v1",
        "ClusterRole" => "rbac.authorization.k8s.io/v1",
        _ => "v1",
    };
    let mut value = serde_json::json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": { "name": name },
    });
    if let Some(ns) = namespace {
        value["metadata"]["namespace"] = serde_json::json!(ns);
    }
    ManifestDocument::from_value(value).unwrap()
}
