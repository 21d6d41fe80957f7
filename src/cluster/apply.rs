//! Kubernetes resource apply engine.
//!
//! Every object of the candidate manifest is resolved through API discovery
//! and server-side applied with a forced field manager, which creates missing
//! objects and updates existing ones in one call.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use kube::{
    api::{Api, DynamicObject, Patch, PatchParams},
    core::GroupVersionKind,
    discovery::{Scope, oneshot::pinned_kind},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::connection::ClusterConnection;
use super::manifest::{ManifestObject, parse_manifests};
use crate::ai::timeout::guarded;
use crate::types::{AssistError, CandidateManifest, Result};

/// What the apply did to an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Created,
    Configured,
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyAction::Created => write!(f, "created"),
            ApplyAction::Configured => write!(f, "configured"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedObject {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub action: ApplyAction,
}

impl fmt::Display for AppliedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.kind.to_lowercase(), self.name, self.action)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyResult {
    pub objects: Vec<AppliedObject>,
}

/// Hands a confirmed candidate to the cluster
#[async_trait]
pub trait Applier: Send + Sync {
    async fn apply(
        &self,
        cancel: &CancellationToken,
        manifest: &CandidateManifest,
    ) -> Result<ApplyResult>;
}

/// Applier backed by a live cluster connection
pub struct ManifestApplier {
    connection: Option<ClusterConnection>,
    field_manager: String,
    timeout: Duration,
}

impl ManifestApplier {
    pub fn new(
        connection: Option<ClusterConnection>,
        field_manager: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            connection,
            field_manager: field_manager.into(),
            timeout,
        }
    }

    async fn apply_all(
        &self,
        connection: &ClusterConnection,
        objects: Vec<ManifestObject>,
    ) -> Result<ApplyResult> {
        let mut result = ApplyResult::default();
        for object in objects {
            let applied = self.apply_object(connection, object).await?;
            info!("{}", applied);
            result.objects.push(applied);
        }
        Ok(result)
    }

    #[instrument(skip(self, connection, object), fields(kind = %object.kind, name = %object.name))]
    async fn apply_object(
        &self,
        connection: &ClusterConnection,
        object: ManifestObject,
    ) -> Result<AppliedObject> {
        let gvk = gvk_from_api_version(&object.api_version, &object.kind);
        let client = connection.client().clone();

        let (api_resource, capabilities) = pinned_kind(&client, &gvk).await.map_err(|e| {
            map_kube_error(e, &format!("resolving {}/{}", object.api_version, object.kind))
        })?;

        let namespace = match capabilities.scope {
            Scope::Namespaced => Some(
                object
                    .namespace
                    .clone()
                    .unwrap_or_else(|| connection.default_namespace().to_string()),
            ),
            Scope::Cluster => None,
        };

        let api: Api<DynamicObject> = match namespace.as_deref() {
            Some(ns) => Api::namespaced_with(client, ns, &api_resource),
            None => Api::all_with(client, &api_resource),
        };

        let exists = api
            .get_opt(&object.name)
            .await
            .map_err(|e| map_kube_error(e, "checking existence"))?
            .is_some();

        debug!(exists, namespace = ?namespace, "server-side apply");

        let params = PatchParams::apply(&self.field_manager).force();
        api.patch(&object.name, &params, &Patch::Apply(&object.body))
            .await
            .map_err(|e| map_kube_error(e, "applying"))?;

        Ok(AppliedObject {
            kind: object.kind,
            name: object.name,
            namespace,
            action: if exists {
                ApplyAction::Configured
            } else {
                ApplyAction::Created
            },
        })
    }
}

#[async_trait]
impl Applier for ManifestApplier {
    async fn apply(
        &self,
        cancel: &CancellationToken,
        manifest: &CandidateManifest,
    ) -> Result<ApplyResult> {
        let objects = parse_manifests(manifest.as_str())?;

        let connection = self.connection.as_ref().ok_or_else(|| {
            AssistError::Connection("no usable kubeconfig; cannot reach the cluster".to_string())
        })?;

        info!(
            "Applying {} object(s) to context '{}'",
            objects.len(),
            connection.context()
        );

        guarded(
            cancel,
            self.timeout,
            self.apply_all(connection, objects),
            "apply",
            AssistError::connection_timeout,
        )
        .await
    }
}

/// Split `group/version` (core resources have no group)
fn gvk_from_api_version(api_version: &str, kind: &str) -> GroupVersionKind {
    let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
    GroupVersionKind::gvk(group, version, kind)
}

/// Server answers become `ApplyRejected`, everything else is a connection problem
fn map_kube_error(error: kube::Error, during: &str) -> AssistError {
    match error {
        kube::Error::Api(status) => AssistError::ApplyRejected(status.message.clone()),
        kube::Error::Discovery(e) => AssistError::ApplyRejected(format!("{}: {}", during, e)),
        other => AssistError::Connection(format!("{}: {}", during, other)),
    }
}
