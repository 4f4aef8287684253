//! Reconciliation of TenantCluster objects.
//!
//! A tick runs the resource chain against a fresh [`TickContext`]:
//! network, peer role, VPC peering, encryption key, stack. Creation walks
//! the chain in that order; deletion walks it backwards.

use crate::backoff::ExponentialBackoff;
use crate::config::OperatorConfig;
use crate::context::TickContext;
use crate::dependencies::{PeerRoleResource, VpcPeeringResource};
use crate::encryption::{EncryptionBackend, EncryptionResource};
use crate::error::ControllerError;
use crate::network::{NetworkAllocator, NetworkResource, ReservedRangeCollector};
use crate::resource::{run_create_chain, run_delete_chain, Resource, RetryPolicy, RetryResource, TickOutcome};
use crate::stack::StackResource;
use crate::store::ClusterStore;
use cloud_client::CloudProvider;
use crds::TenantCluster;
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Requeue delay after a tick cancelled itself
pub const CANCELLED_REQUEUE: Duration = Duration::from_secs(30);

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: ExponentialBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: ExponentialBackoff::new(Duration::from_secs(10), Duration::from_secs(600)),
            error_count: 0,
        }
    }

    fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Build the resource chain in creation order, each step wrapped in the
/// retry decorator.
pub fn resource_chain(
    config: &OperatorConfig,
    cloud: Arc<dyn CloudProvider>,
    store: Arc<dyn ClusterStore>,
    allocator: Arc<NetworkAllocator>,
    retry: &RetryPolicy,
) -> Result<Vec<Box<dyn Resource>>, ControllerError> {
    let collector = ReservedRangeCollector::new(cloud.clone(), store.clone(), config.installation.clone());
    let backend = EncryptionBackend::from_config(&config.encrypter, cloud.clone(), &config.installation)?;

    let network = NetworkResource::new(allocator, collector, store, config.network_pool, config.subnet_prefix);
    let peer_role = PeerRoleResource::new(cloud.clone(), config.host_peer_role_name.clone());
    let peering = VpcPeeringResource::new(cloud.clone());
    let encryption = EncryptionResource::new(backend);
    let stack = StackResource::new(cloud, config.installation.clone());

    Ok(vec![
        Box::new(RetryResource::new(network, retry.clone())),
        Box::new(RetryResource::new(peer_role, retry.clone())),
        Box::new(RetryResource::new(peering, retry.clone())),
        Box::new(RetryResource::new(encryption, retry.clone())),
        Box::new(RetryResource::new(stack, retry.clone())),
    ])
}

/// Reconciles TenantCluster objects.
pub struct Reconciler {
    resources: Vec<Box<dyn Resource>>,
    resync_period: Duration,
    /// Error count tracking per resource (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("resources", &self.resources.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("resync_period", &self.resync_period)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(resources: Vec<Box<dyn Resource>>, resync_period: Duration) -> Self {
        Self {
            resources,
            resync_period,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Drive the cluster's infrastructure toward its spec.
    pub async fn apply(&self, cluster: &TenantCluster) -> Result<Action, ControllerError> {
        let mut ctx = TickContext::new(cluster)?;
        debug!("Reconciling TenantCluster {}", ctx.key());

        let outcome = run_create_chain(&self.resources, &mut ctx).await?;
        self.reset_error(&ctx.key());

        Ok(match outcome {
            TickOutcome::Completed => {
                info!("TenantCluster {} is up to date", ctx.key());
                Action::requeue(self.resync_period)
            }
            TickOutcome::Cancelled { .. } => Action::requeue(CANCELLED_REQUEUE),
        })
    }

    /// Tear down the cluster's infrastructure.
    ///
    /// Returns an error while deletion is still pending so the finalizer is
    /// kept in place.
    pub async fn cleanup(&self, cluster: &TenantCluster) -> Result<Action, ControllerError> {
        let mut ctx = TickContext::new(cluster)?;
        info!("Cleaning up TenantCluster {}", ctx.key());

        match run_delete_chain(&self.resources, &mut ctx).await? {
            TickOutcome::Completed => {
                self.forget(&ctx.key());
                info!("TenantCluster {} cleaned up", ctx.key());
                Ok(Action::await_change())
            }
            TickOutcome::Cancelled { resource, reason } => Err(ControllerError::CleanupPending(format!(
                "{} of {}: {}",
                resource,
                ctx.key(),
                reason
            ))),
        }
    }

    /// Advance and return the error backoff for a resource.
    ///
    /// Returns (backoff, error_count)
    pub fn error_backoff(&self, resource_key: &str) -> (Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(BackoffState::new);
                state.error_count += 1;
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (Duration::from_secs(60), 0)
            }
        }
    }

    /// Reset error count for a resource (on successful reconciliation)
    pub fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }

    fn forget(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }
}
