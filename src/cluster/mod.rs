//! Kubernetes cluster access: connection, manifest parsing and apply.
//!
//! Uses kube-rs directly instead of shelling out to kubectl.

pub mod apply;
pub mod connection;
pub mod manifest;

pub use apply::{AppliedObject, Applier, ApplyAction, ApplyResult, ManifestApplier};
pub use connection::ClusterConnection;
pub use manifest::{ManifestObject, parse_manifests};
