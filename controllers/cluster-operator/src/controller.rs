//! Main controller implementation.
//!
//! Wires the Kubernetes client, the cloud client, the shared network
//! allocator and the resource chain together and runs the watcher.

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::network::NetworkAllocator;
use crate::reconciler::{resource_chain, Reconciler};
use crate::resource::RetryPolicy;
use crate::store::{ClusterStore, KubeClusterStore};
use crate::watcher::{watch_tenant_clusters, Context};
use cloud_client::{CloudClient, CloudProvider};
use crds::TenantCluster;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for tenant cluster infrastructure.
#[derive(Debug)]
pub struct Controller {
    tenant_cluster_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: OperatorConfig) -> Result<Self, ControllerError> {
        info!("Initializing cluster operator");

        let kube_client = Client::try_default().await?;

        let cloud_client = CloudClient::new(config.cloud_api_url.clone(), config.cloud_api_token.clone())?;

        // Validate token and connectivity before proceeding
        info!("Validating cloud gateway token and connectivity...");
        cloud_client.validate_token().await.map_err(|e| {
            error!("Failed to validate cloud gateway token: {}", e);
            error!("Please ensure:");
            error!("  1. CLOUD_API_TOKEN environment variable is set correctly");
            error!("  2. The cloud gateway is reachable at {}", config.cloud_api_url);
            ControllerError::Cloud(e)
        })?;
        info!("Cloud gateway token validated and connectivity established");

        let cloud: Arc<dyn CloudProvider> = Arc::new(cloud_client);
        let store: Arc<dyn ClusterStore> = Arc::new(KubeClusterStore::new(kube_client.clone(), config.namespace.clone()));

        // One allocator per process, shared by every tick
        let allocator = Arc::new(NetworkAllocator::new());

        let resources = resource_chain(&config, cloud, store, allocator, &RetryPolicy::default())?;
        let reconciler = Reconciler::new(resources, config.resync_period);

        let api: Api<TenantCluster> = match &config.namespace {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };
        let context = Arc::new(Context {
            client: kube_client,
            reconciler,
        });

        let tenant_cluster_watcher = tokio::spawn(async move { watch_tenant_clusters(api, context).await });

        Ok(Self { tenant_cluster_watcher })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Cluster operator running");

        self.tenant_cluster_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("TenantCluster watcher panicked: {}", e)))?
            .map_err(|e| ControllerError::Watch(format!("TenantCluster watcher error: {}", e)))?;

        info!("Cluster operator stopped");
        Ok(())
    }
}
