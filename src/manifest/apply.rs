//! Create-or-update of decoded manifest objects
//!
//! Every object is created first. When the API server reports it already
//! exists, ConfigMaps are left untouched (they hold user-tunable
//! configuration) while every other kind is re-read and replaced with the
//! manifest content, carrying over the stored resourceVersion.

use tracing::{debug, info, warn};

use super::{DocumentDecoder, ManifestDocument, ObjectFailure, ObjectStore};
use crate::Error;

/// What to do with object-level failures once a stream has been applied
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Any failed object fails the whole apply
    #[default]
    Strict,
    /// Failed objects are logged and the apply counts as successful
    Lenient,
}

/// Per-stream apply settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyPolicy {
    /// Namespace for namespaced objects whose manifest leaves it empty
    pub namespace: String,
    /// Leave existing ConfigMaps untouched instead of replacing them
    pub protect_config_maps: bool,
    /// How object-level failures affect the result
    pub failure: FailurePolicy,
}

impl ApplyPolicy {
    /// Default policy: ConfigMaps protected, failures strict
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            protect_config_maps: true,
            failure: FailurePolicy::Strict,
        }
    }

    /// Enable or disable ConfigMap protection
    pub fn with_config_map_protection(mut self, protect: bool) -> Self {
        self.protect_config_maps = protect;
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, failure: FailurePolicy) -> Self {
        self.failure = failure;
        self
    }
}

/// Result of applying a single object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The object did not exist and was created
    Created,
    /// The object existed and was replaced with the manifest content
    Replaced,
    /// The object existed and was deliberately left as is
    Unchanged,
}

/// Tally of one apply pass over a manifest stream
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Objects created
    pub created: usize,
    /// Existing objects replaced
    pub replaced: usize,
    /// Existing objects left untouched
    pub unchanged: usize,
    /// Documents the decoder skipped as invalid
    pub skipped_documents: usize,
    /// Objects that failed to apply, in stream order
    pub failures: Vec<ObjectFailure>,
}

impl ApplyReport {
    /// Number of objects the pass attempted to apply
    pub fn attempted(&self) -> usize {
        self.created + self.replaced + self.unchanged + self.failures.len()
    }

    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Created => self.created += 1,
            ApplyOutcome::Replaced => self.replaced += 1,
            ApplyOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Convert the report into a result according to `policy`
    ///
    /// Under [`FailurePolicy::Strict`] any failure becomes one [`Error::Apply`]
    /// carrying every object-level failure.
    pub fn into_result(self, policy: FailurePolicy) -> Result<Self, Error> {
        if self.failures.is_empty() || policy == FailurePolicy::Lenient {
            return Ok(self);
        }
        Err(Error::Apply {
            total: self.attempted(),
            failures: self.failures,
        })
    }
}

/// Apply a single object with create-or-update semantics
pub async fn apply_document(
    store: &dyn ObjectStore,
    mut doc: ManifestDocument,
    policy: &ApplyPolicy,
) -> Result<ApplyOutcome, Error> {
    if doc.namespace().is_none() && store.is_namespaced(&doc).await? {
        doc.default_namespace(&policy.namespace);
    }

    match store.create(&doc).await {
        Ok(()) => {
            debug!(object = %doc.describe(), "created object");
            Ok(ApplyOutcome::Created)
        }
        Err(e) if e.is_already_exists() => {
            if policy.protect_config_maps && doc.is_config_map() {
                info!(object = %doc.describe(), "ConfigMap already exists, leaving it unchanged");
                return Ok(ApplyOutcome::Unchanged);
            }

            let existing = store.get(&doc).await?;
            doc.set_resource_version(existing.metadata.resource_version);
            store.replace(&doc).await?;
            debug!(object = %doc.describe(), "replaced existing object");
            Ok(ApplyOutcome::Replaced)
        }
        Err(e) => Err(e),
    }
}

/// Apply every document of a stream in order
///
/// Object failures are logged and collected; they never stop the pass. Once
/// the stream is exhausted the report is judged by `policy.failure`.
pub async fn apply_all(
    store: &dyn ObjectStore,
    mut documents: DocumentDecoder<'_>,
    policy: &ApplyPolicy,
) -> Result<ApplyReport, Error> {
    let mut report = ApplyReport::default();

    for doc in documents.by_ref() {
        let described = doc.describe();
        let failure_target = doc.clone();
        match apply_document(store, doc, policy).await {
            Ok(outcome) => report.record(outcome),
            Err(e) => {
                warn!(object = %described, error = %e, "failed to apply object");
                report
                    .failures
                    .push(ObjectFailure::for_document(&failure_target, &e));
            }
        }
    }

    report.skipped_documents = documents.skipped();
    debug!(
        created = report.created,
        replaced = report.replaced,
        unchanged = report.unchanged,
        failed = report.failures.len(),
        skipped = report.skipped_documents,
        "manifest stream applied"
    );
    report.into_result(policy.failure)
}
