//! Upstream dependencies of the stack.
//!
//! Neither resource creates anything. Both look up something another
//! system provisions and cancel the tick until it shows up.

use crate::config::CLUSTER_TAG;
use crate::context::TickContext;
use crate::error::ControllerError;
use crate::resource::{Flow, Resource};
use cloud_client::{CloudProvider, PeeringStatus};
use std::sync::Arc;
use tracing::{debug, info};

/// Host-side role the tenant stack assumes for VPC peering
pub struct PeerRoleResource {
    cloud: Arc<dyn CloudProvider>,
    role_name: String,
}

impl std::fmt::Debug for PeerRoleResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerRoleResource")
            .field("role_name", &self.role_name)
            .finish_non_exhaustive()
    }
}

impl PeerRoleResource {
    pub fn new(cloud: Arc<dyn CloudProvider>, role_name: String) -> Self {
        Self { cloud, role_name }
    }
}

#[async_trait::async_trait]
impl Resource for PeerRoleResource {
    fn name(&self) -> &str {
        "peer-role"
    }

    async fn ensure_created(&self, ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        match self.cloud.get_role(&self.role_name).await {
            Ok(role) => {
                debug!("Found peer role {} for {}", role.arn, ctx.key());
                ctx.peer_role_arn = Some(role.arn);
                Ok(Flow::Continue)
            }
            Err(e) if e.is_not_found() => {
                info!("Peer role {} does not exist yet", self.role_name);
                Ok(Flow::cancel(format!("peer role {} not found", self.role_name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_deleted(&self, _ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        Ok(Flow::Continue)
    }
}

/// Active VPC peering connection tagged with the cluster id
pub struct VpcPeeringResource {
    cloud: Arc<dyn CloudProvider>,
}

impl std::fmt::Debug for VpcPeeringResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VpcPeeringResource").finish_non_exhaustive()
    }
}

impl VpcPeeringResource {
    pub fn new(cloud: Arc<dyn CloudProvider>) -> Self {
        Self { cloud }
    }
}

#[async_trait::async_trait]
impl Resource for VpcPeeringResource {
    fn name(&self) -> &str {
        "vpc-peering"
    }

    async fn ensure_created(&self, ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        let connections = self
            .cloud
            .describe_vpc_peering_connections(&[(CLUSTER_TAG, ctx.cluster_id())])
            .await?;

        match connections.into_iter().find(|c| c.status == PeeringStatus::Active) {
            Some(connection) => {
                debug!("Found peering connection {} for {}", connection.id, ctx.key());
                ctx.peering_connection_id = Some(connection.id);
                Ok(Flow::Continue)
            }
            None => {
                info!("No active peering connection for {} yet", ctx.key());
                Ok(Flow::cancel("no active VPC peering connection"))
            }
        }
    }

    async fn ensure_deleted(&self, _ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_cluster, TEST_CLUSTER_ID};
    use cloud_client::{MockCloudProvider, Role, VpcPeeringConnection};

    #[tokio::test]
    async fn test_missing_role_cancels() {
        let cloud = Arc::new(MockCloudProvider::new());
        let resource = PeerRoleResource::new(cloud.clone(), "gauss-vpc-peer-access".to_string());
        let mut ctx = TickContext::new(&create_test_cluster("alpha", "default", None)).unwrap();

        let flow = resource.ensure_created(&mut ctx).await.unwrap();
        assert!(matches!(flow, Flow::Cancel(_)));
        assert_eq!(ctx.peer_role_arn, None);

        cloud.add_role(Role {
            name: "gauss-vpc-peer-access".to_string(),
            arn: "arn:role/gauss-vpc-peer-access".to_string(),
        });
        let flow = resource.ensure_created(&mut ctx).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(ctx.peer_role_arn.as_deref(), Some("arn:role/gauss-vpc-peer-access"));
    }

    #[tokio::test]
    async fn test_only_active_peering_counts() {
        let cloud = Arc::new(MockCloudProvider::new());
        let resource = VpcPeeringResource::new(cloud.clone());
        let mut ctx = TickContext::new(&create_test_cluster("alpha", "default", None)).unwrap();

        let tags = [(CLUSTER_TAG.to_string(), TEST_CLUSTER_ID.to_string())].into_iter().collect();
        cloud.add_peering(VpcPeeringConnection {
            id: "pcx-pending".to_string(),
            status: PeeringStatus::PendingAcceptance,
            tags,
        });
        let flow = resource.ensure_created(&mut ctx).await.unwrap();
        assert!(matches!(flow, Flow::Cancel(_)));

        let tags = [(CLUSTER_TAG.to_string(), TEST_CLUSTER_ID.to_string())].into_iter().collect();
        cloud.add_peering(VpcPeeringConnection {
            id: "pcx-active".to_string(),
            status: PeeringStatus::Active,
            tags,
        });
        let flow = resource.ensure_created(&mut ctx).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(ctx.peering_connection_id.as_deref(), Some("pcx-active"));
    }
}
