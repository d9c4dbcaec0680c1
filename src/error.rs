//! Error types for the KServe operator

use thiserror::Error;

use crate::manifest::ObjectFailure;

/// Main error type for operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Manifest could not be retrieved from its URL or local path
    #[error("failed to fetch manifest {locator}: {message}")]
    Fetch {
        /// URL or path that was being fetched
        locator: String,
        /// Description of what failed
        message: String,
    },

    /// A single document in a manifest stream could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// One or more objects of a manifest stream failed to apply
    #[error("{} of {total} objects failed to apply: {}", .failures.len(), summarize(.failures))]
    Apply {
        /// Number of objects the apply pass attempted
        total: usize,
        /// Every object-level failure, in apply order
        failures: Vec<ObjectFailure>,
    },

    /// A deployment step of a component failed
    #[error("component {component} step {step} failed: {source}")]
    Component {
        /// Component being deployed
        component: String,
        /// Name of the step that failed
        step: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Validation error for CRD specs or operator configuration
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal/operational error
    #[error("internal error: {0}")]
    Internal(String),
}

fn summarize(failures: &[ObjectFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a fetch error for the given locator
    pub fn fetch(locator: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            locator: locator.into(),
            message: msg.into(),
        }
    }

    /// Create a decode error with the given message
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap an error as the failure of a component step
    pub fn component(component: impl Into<String>, step: impl Into<String>, source: Error) -> Self {
        Self::Component {
            component: component.into(),
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// True when the API server rejected a create because the object exists
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(ae)) if ae.code == 409)
    }

    /// True when the API server reported the object as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(ae)) if ae.code == 404)
    }
}

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> Error {
    Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} ({code})"),
        reason: reason.to_string(),
        code,
    }))
}
