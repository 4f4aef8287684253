//! Per-tick scratch state.
//!
//! A `TickContext` is created when a reconciliation tick starts, passed by
//! mutable reference through every resource in the chain and dropped when
//! the tick ends. Nothing in it outlives the tick.

use crate::error::ControllerError;
use crate::stack::ObservedStackState;
use crds::TenantCluster;
use ipnet::Ipv4Net;
use kube::ResourceExt;

/// Scratch state shared by the resources of one tick
#[derive(Debug, Clone)]
pub struct TickContext {
    pub cluster: TenantCluster,
    pub namespace: String,
    pub name: String,
    /// Allocated network, once it is visible in the cluster status
    pub network: Option<Ipv4Net>,
    /// Identifier of the host peer role
    pub peer_role_arn: Option<String>,
    /// Identifier of the active VPC peering connection
    pub peering_connection_id: Option<String>,
    /// Identifier of the cluster's encryption key
    pub encryption_key: Option<String>,
    /// Stack facts captured during this tick
    pub observed: ObservedStackState,
}

impl TickContext {
    /// Start a tick for the given cluster object.
    pub fn new(cluster: &TenantCluster) -> Result<Self, ControllerError> {
        let namespace = cluster.namespace().ok_or_else(|| {
            ControllerError::InvalidConfig(format!("TenantCluster {} has no namespace", cluster.name_any()))
        })?;

        Ok(Self {
            name: cluster.name_any(),
            namespace,
            cluster: cluster.clone(),
            network: None,
            peer_role_arn: None,
            peering_connection_id: None,
            encryption_key: None,
            observed: ObservedStackState::default(),
        })
    }

    /// `namespace/name` of the cluster object
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Cluster id from the spec
    pub fn cluster_id(&self) -> &str {
        &self.cluster.spec.cluster_id
    }
}
