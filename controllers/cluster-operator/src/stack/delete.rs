//! Stack deletion path.
//!
//! Volume cleanup is best effort: failures are logged and deletion of the
//! stack itself still goes ahead. A stack that is already gone or already
//! being deleted counts as deleted.

use super::reconciler::{stack_name, StackResource};
use crate::config::CLUSTER_TAG;
use crate::context::TickContext;
use crate::error::ControllerError;
use crate::resource::Flow;
use tracing::{debug, info, warn};

impl StackResource {
    pub(super) async fn delete(&self, ctx: &TickContext) -> Result<Flow, ControllerError> {
        let name = stack_name(ctx.cluster_id());

        self.release_volumes(ctx.cluster_id()).await;

        match self.cloud.set_termination_protection(&name, false).await {
            Ok(()) => debug!("Disabled termination protection on stack {}", name),
            Err(e) if e.is_not_found() => {
                info!("Stack {} for {} is already gone", name, ctx.key());
                return Ok(Flow::Continue);
            }
            Err(e) => return Err(e.into()),
        }

        match self.cloud.delete_stack(&name).await {
            Ok(()) => info!("Requested deletion of stack {} for {}", name, ctx.key()),
            Err(e) if e.is_not_found() || e.is_in_progress() => {
                debug!("Stack {} is already gone or being deleted: {}", name, e);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Flow::Continue)
    }

    /// Force-detach and delete every volume of the cluster.
    async fn release_volumes(&self, cluster_id: &str) {
        let volumes = match self.cloud.describe_volumes(&[(CLUSTER_TAG, cluster_id)]).await {
            Ok(volumes) => volumes,
            Err(e) => {
                warn!("Failed to list volumes of cluster {}: {}", cluster_id, e);
                return;
            }
        };

        for volume in &volumes {
            for attachment in &volume.attachments {
                if let Err(e) = self.cloud.detach_volume(&volume.id, &attachment.instance_id, true).await {
                    warn!(
                        "Failed to detach volume {} from instance {}: {}",
                        volume.id, attachment.instance_id, e
                    );
                }
            }

            match self.cloud.delete_volume(&volume.id).await {
                Ok(()) => info!("Deleted volume {} of cluster {}", volume.id, cluster_id),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("Failed to delete volume {}: {}", volume.id, e),
            }
        }
    }
}
