//! Kubernetes object store seam.
//!
//! The allocation path needs three things from the API server: the CIDRs
//! persisted by current and legacy cluster objects, and a way to write the
//! allocated CIDR into one cluster's status. `ClusterStore` keeps that
//! behind a trait so the reconciler can be tested against memory.

use crate::error::ControllerError;
use crds::{LegacyClusterConfig, TenantCluster};
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};
use tracing::{debug, info};

/// Reads and writes of cluster objects used during allocation
#[async_trait::async_trait]
pub trait ClusterStore: Send + Sync {
    /// CIDRs persisted in the status of `TenantCluster` objects
    async fn tenant_network_cidrs(&self) -> Result<Vec<String>, ControllerError>;

    /// CIDRs persisted in the status of `LegacyClusterConfig` objects
    async fn legacy_network_cidrs(&self) -> Result<Vec<String>, ControllerError>;

    /// Write the allocated CIDR into a cluster's status.
    ///
    /// The field is write-once: writing the same value again succeeds,
    /// writing a different value over an existing one fails.
    async fn persist_network_cidr(&self, namespace: &str, name: &str, cidr: &str) -> Result<(), ControllerError>;
}

/// `ClusterStore` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterStore {
    client: Client,
    namespace: Option<String>,
}

impl std::fmt::Debug for KubeClusterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl KubeClusterStore {
    /// Lists are scoped to `namespace` when set, cluster-wide otherwise.
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    fn scoped_api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = kube::core::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait::async_trait]
impl ClusterStore for KubeClusterStore {
    async fn tenant_network_cidrs(&self) -> Result<Vec<String>, ControllerError> {
        let api: Api<TenantCluster> = self.scoped_api();
        let clusters = api.list(&ListParams::default()).await?;
        Ok(clusters
            .items
            .iter()
            .filter_map(|c| c.network_cidr().map(str::to_string))
            .collect())
    }

    async fn legacy_network_cidrs(&self) -> Result<Vec<String>, ControllerError> {
        let api: Api<LegacyClusterConfig> = self.scoped_api();
        let configs = api.list(&ListParams::default()).await?;
        Ok(configs
            .items
            .iter()
            .filter_map(|c| c.network_cidr().map(str::to_string))
            .collect())
    }

    async fn persist_network_cidr(&self, namespace: &str, name: &str, cidr: &str) -> Result<(), ControllerError> {
        let api: Api<TenantCluster> = Api::namespaced(self.client.clone(), namespace);

        // Status may already hold a block written by an earlier tick.
        let current = api.get_status(name).await?;
        match current.network_cidr() {
            Some(existing) if existing == cidr => {
                debug!("TenantCluster {}/{} already has network {}", namespace, name, cidr);
                return Ok(());
            }
            Some(existing) => {
                return Err(ControllerError::Allocation(format!(
                    "TenantCluster {}/{} already has network {}, refusing to overwrite with {}",
                    namespace, name, existing, cidr
                )));
            }
            None => {}
        }

        let status_patch = serde_json::json!({
            "status": {
                "network": {
                    "cidr": cidr,
                }
            }
        });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await?;

        info!("Persisted network {} to TenantCluster {}/{}", cidr, namespace, name);
        Ok(())
    }
}
