//! Kubernetes cluster connection management.

use std::time::Duration;

use kube::{
    Client, Config,
    config::{KubeConfigOptions, Kubeconfig},
};
use tracing::{debug, instrument};

use crate::config::ClusterConfig;
use crate::constants::cluster::FALLBACK_NAMESPACE;
use crate::types::{AssistError, Result};

/// Represents a connection to a Kubernetes cluster.
///
/// Built once per run and shared (cloned handle) by the schema resolver and
/// the applier. Construction does not contact the API server.
#[derive(Clone)]
pub struct ClusterConnection {
    client: Client,
    context: String,
    default_namespace: String,
}

impl std::fmt::Debug for ClusterConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConnection")
            .field("context", &self.context)
            .field("default_namespace", &self.default_namespace)
            .finish_non_exhaustive()
    }
}

impl ClusterConnection {
    /// Connect using `--kubeconfig` when given, else `$KUBECONFIG` / `~/.kube/config`
    #[instrument(skip_all)]
    pub async fn from_config(config: &ClusterConfig) -> Result<Self> {
        let kubeconfig = match &config.kubeconfig {
            Some(path) => Kubeconfig::read_from(path),
            None => Kubeconfig::read(),
        }
        .map_err(|e| AssistError::Connection(format!("loading kubeconfig: {}", e)))?;

        Self::from_kubeconfig(kubeconfig, config).await
    }

    /// Connect using an already-loaded kubeconfig
    #[instrument(skip_all)]
    pub async fn from_kubeconfig(kubeconfig: Kubeconfig, config: &ClusterConfig) -> Result<Self> {
        let context = config
            .context
            .clone()
            .or_else(|| kubeconfig.current_context.clone())
            .unwrap_or_default();

        let mut kube_config = Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: config.context.clone(),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| AssistError::Connection(format!("resolving context '{}': {}", context, e)))?;

        if let Some(namespace) = &config.namespace {
            kube_config.default_namespace = namespace.clone();
        }
        if kube_config.default_namespace.is_empty() {
            kube_config.default_namespace = FALLBACK_NAMESPACE.to_string();
        }
        kube_config.read_timeout = Some(Duration::from_secs(config.timeout_secs));

        let default_namespace = kube_config.default_namespace.clone();
        let client = Client::try_from(kube_config)
            .map_err(|e| AssistError::Connection(format!("building client: {}", e)))?;

        debug!(context = %context, namespace = %default_namespace, "cluster connection ready");

        Ok(Self {
            client,
            context,
            default_namespace,
        })
    }

    /// Get a reference to the underlying kube client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Namespace used for manifests that name none.
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Resolved kubeconfig context name.
    pub fn context(&self) -> &str {
        &self.context
    }
}
