//! KServe operator - CRD-driven installation of KServe and its dependencies
//!
//! A `KServeDeployment` resource names a KServe version and an ordered list of
//! components. The controller fetches each component's release manifests,
//! applies them with create-or-update semantics, switches KServe to
//! RawDeployment mode and reports progress on the resource status.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (KServeDeployment)
//! - [`controller`] - Reconciliation state machine
//! - [`component`] - Component registry and per-component deployment
//! - [`manifest`] - Manifest fetch, decode and apply pipeline
//! - [`retry`] - Exponential backoff for startup operations
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod component;
pub mod controller;
pub mod crd;
pub mod error;
pub mod manifest;
pub mod retry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager recorded on every object and status the operator writes
pub const FIELD_MANAGER: &str = "kserve-operator";
