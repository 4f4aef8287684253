//! TenantCluster watcher.
//!
//! Runs a kube_runtime::Controller over TenantCluster objects. Each object
//! carries a finalizer so deletion goes through the cleanup chain before
//! the object disappears.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::TenantCluster;
use futures::StreamExt;
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::finalizer::{finalizer, Event as FinalizerEvent};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Finalizer guarding cloud resources of a TenantCluster
pub const FINALIZER: &str = "infra.tenantstack.io/cleanup";

/// Shared state handed to every reconciliation
pub struct Context {
    pub client: Client,
    pub reconciler: Reconciler,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

fn object_key(cluster: &TenantCluster) -> String {
    format!("{}/{}", cluster.namespace().unwrap_or_default(), cluster.name_any())
}

async fn reconcile(cluster: Arc<TenantCluster>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let namespace = cluster.namespace().ok_or_else(|| {
        ControllerError::InvalidConfig(format!("TenantCluster {} has no namespace", cluster.name_any()))
    })?;
    let api: Api<TenantCluster> = Api::namespaced(ctx.client.clone(), &namespace);
    let reconciler = &ctx.reconciler;

    finalizer(&api, FINALIZER, cluster, |event| async move {
        match event {
            FinalizerEvent::Apply(cluster) => reconciler.apply(&cluster).await,
            FinalizerEvent::Cleanup(cluster) => reconciler.cleanup(&cluster).await,
        }
    })
    .await
    .map_err(|e| ControllerError::Finalizer(Box::new(e)))
}

fn error_policy(cluster: Arc<TenantCluster>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let key = object_key(&cluster);
    let (delay, error_count) = ctx.reconciler.error_backoff(&key);
    error!(
        "Reconciliation error for TenantCluster {} (error {}), retrying in {:?}: {}",
        key, error_count, delay, error
    );
    Action::requeue(delay)
}

/// Watch TenantCluster objects until the stream ends.
pub async fn watch_tenant_clusters(api: Api<TenantCluster>, context: Arc<Context>) -> Result<(), ControllerError> {
    info!("Starting TenantCluster watcher");

    // Debounce batches bursts of events for the same object; concurrency
    // bounds parallel ticks across clusters.
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(8);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled TenantCluster {}", obj.name),
                Err(e) => error!("Controller error for TenantCluster: {}", e),
            }
        })
        .await;

    Ok(())
}
