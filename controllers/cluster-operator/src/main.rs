//! Tenant Cluster Operator
//!
//! Provisions and reconciles the cloud infrastructure behind TenantCluster
//! objects:
//! - allocates a non-overlapping network block per cluster from a shared pool
//! - waits for the peer role and VPC peering connection
//! - ensures the per-cluster encryption key
//! - creates, updates and scales the cluster's infrastructure stack

mod backoff;
mod config;
mod context;
mod controller;
mod dependencies;
mod encryption;
mod error;
mod network;
mod reconciler;
mod resource;
mod stack;
mod store;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting Tenant Cluster Operator");

    let config = OperatorConfig::from_env()?;

    info!("Configuration:");
    info!("  Cloud gateway URL: {}", config.cloud_api_url);
    info!("  Installation: {}", config.installation);
    info!("  Network pool: {} (/{} per cluster)", config.network_pool, config.subnet_prefix);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
