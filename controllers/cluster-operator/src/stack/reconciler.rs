//! Stack lifecycle reconciler.
//!
//! Per tick the stack step walks these states, re-derived every time:
//!
//! - NoNetwork: no allocated block in the context, cancel
//! - WaitingOnDependency: peer role, peering connection or encryption key
//!   missing from the context, cancel
//! - AbsentStack: render and request creation, then cancel
//! - Transitioning: the provider is still working on the stack, cancel
//! - Stable: run detection and update, scale or do nothing
//!
//! Long provider operations are never awaited here; the next tick observes
//! their progress.

use super::detection::{decide, DecisionOutcome};
use super::observed::{ObservedStackState, StackOutputs};
use super::template::{ResourceNames, StackParameters};
use crate::config::{CLUSTER_TAG, INSTALLATION_TAG, LOGICAL_ID_TAG};
use crate::context::TickContext;
use crate::error::ControllerError;
use crate::resource::{Flow, Resource};
use cloud_client::{CloudProvider, CreateStackRequest, Instance, InstanceState, Tags, UpdateStackRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Name of the stack backing a tenant cluster's control plane.
pub fn stack_name(cluster_id: &str) -> String {
    format!("cluster-{}-tccp", cluster_id)
}

/// How long to wait for the master instance to stop within one tick
#[derive(Debug, Clone, Copy)]
pub struct StopWait {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for StopWait {
    fn default() -> Self {
        Self {
            attempts: 12,
            interval: Duration::from_secs(5),
        }
    }
}

/// Stack lifecycle step
pub struct StackResource {
    pub(super) cloud: Arc<dyn CloudProvider>,
    pub(super) installation: String,
    pub(super) stop_wait: StopWait,
}

impl std::fmt::Debug for StackResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackResource")
            .field("installation", &self.installation)
            .field("stop_wait", &self.stop_wait)
            .finish_non_exhaustive()
    }
}

impl StackResource {
    pub fn new(cloud: Arc<dyn CloudProvider>, installation: String) -> Self {
        Self {
            cloud,
            installation,
            stop_wait: StopWait::default(),
        }
    }

    #[must_use]
    pub fn with_stop_wait(mut self, stop_wait: StopWait) -> Self {
        self.stop_wait = stop_wait;
        self
    }

    async fn create(&self, ctx: &TickContext, name: &str) -> Result<Flow, ControllerError> {
        let body = StackParameters::from_context(ctx, &self.installation, ResourceNames::fresh())?.render()?;

        let mut tags = Tags::new();
        tags.insert(INSTALLATION_TAG.to_string(), self.installation.clone());
        tags.insert(CLUSTER_TAG.to_string(), ctx.cluster_id().to_string());

        let request = CreateStackRequest {
            name: name.to_string(),
            template_body: body,
            enable_termination_protection: true,
            tags,
        };
        match self.cloud.create_stack(request).await {
            Ok(()) => info!("Requested creation of stack {} for {}", name, ctx.key()),
            Err(e) if e.is_already_exists() => debug!("Stack {} already exists", name),
            Err(e) => return Err(e.into()),
        }

        Ok(Flow::cancel(format!("stack {} is being created", name)))
    }

    async fn update(&self, ctx: &TickContext, name: &str, outputs: &StackOutputs) -> Result<Flow, ControllerError> {
        let cluster_id = ctx.cluster_id();

        if let Some(master) = self.find_master_instance(cluster_id, &outputs.master_instance_resource_name).await? {
            if !self.stop_and_wait(cluster_id, &outputs.master_instance_resource_name, &master).await? {
                return Ok(Flow::cancel(format!("waiting for master instance {} to stop", master.id)));
            }

            for volume_name in [&outputs.etcd_volume_resource_name, &outputs.docker_volume_resource_name] {
                self.detach_from(cluster_id, volume_name, &master.id).await?;
            }

            match self.cloud.terminate_instance(&master.id).await {
                Ok(()) => info!("Terminated master instance {} of {}", master.id, ctx.key()),
                Err(e) if e.is_not_found() => debug!("Master instance {} already gone", master.id),
                Err(e) => return Err(e.into()),
            }
        }

        let body = StackParameters::from_context(ctx, &self.installation, ResourceNames::fresh())?.render()?;
        self.request_update(ctx, name, body, "update").await
    }

    async fn scale(&self, ctx: &TickContext, name: &str, outputs: &StackOutputs) -> Result<Flow, ControllerError> {
        let names = ResourceNames::from_outputs(outputs);
        let body = StackParameters::from_context(ctx, &self.installation, names)?.render()?;
        self.request_update(ctx, name, body, "scaling").await
    }

    async fn request_update(&self, ctx: &TickContext, name: &str, body: String, kind: &str) -> Result<Flow, ControllerError> {
        let request = UpdateStackRequest {
            name: name.to_string(),
            template_body: body,
        };
        match self.cloud.update_stack(request).await {
            Ok(()) => info!("Requested {} of stack {} for {}", kind, name, ctx.key()),
            Err(e) if e.is_in_progress() => {
                return Ok(Flow::cancel(format!("stack {} is busy", name)));
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Flow::cancel(format!("stack {} {} in progress", name, kind)))
    }

    /// The live master instance, skipping terminated ones.
    async fn find_master_instance(&self, cluster_id: &str, logical_name: &str) -> Result<Option<Instance>, ControllerError> {
        let instances = self
            .cloud
            .describe_instances(&[(CLUSTER_TAG, cluster_id), (LOGICAL_ID_TAG, logical_name)])
            .await?;
        Ok(instances
            .into_iter()
            .find(|i| !matches!(i.state, InstanceState::Terminated | InstanceState::ShuttingDown)))
    }

    /// Stop the instance and poll until it reports stopped.
    ///
    /// Returns false if it has not stopped within the wait budget.
    async fn stop_and_wait(&self, cluster_id: &str, logical_name: &str, instance: &Instance) -> Result<bool, ControllerError> {
        if instance.state == InstanceState::Stopped {
            return Ok(true);
        }
        if matches!(instance.state, InstanceState::Pending | InstanceState::Running) {
            info!("Stopping master instance {} of cluster {}", instance.id, cluster_id);
            self.cloud.stop_instance(&instance.id).await?;
        }

        for attempt in 0..self.stop_wait.attempts {
            let current = self.find_master_instance(cluster_id, logical_name).await?;
            match current.filter(|i| i.id == instance.id) {
                Some(i) if i.state == InstanceState::Stopped => return Ok(true),
                None => return Ok(true),
                Some(i) => debug!(
                    "Master instance {} is {:?} (check {}/{})",
                    i.id,
                    i.state,
                    attempt + 1,
                    self.stop_wait.attempts
                ),
            }
            tokio::time::sleep(self.stop_wait.interval).await;
        }
        Ok(false)
    }

    /// Detach a data volume from the instance without forcing.
    async fn detach_from(&self, cluster_id: &str, volume_name: &str, instance_id: &str) -> Result<(), ControllerError> {
        let volumes = self
            .cloud
            .describe_volumes(&[(CLUSTER_TAG, cluster_id), (LOGICAL_ID_TAG, volume_name)])
            .await?;

        for volume in volumes {
            if !volume.attachments.iter().any(|a| a.instance_id == instance_id) {
                continue;
            }
            match self.cloud.detach_volume(&volume.id, instance_id, false).await {
                Ok(()) => info!("Detached volume {} from master instance {}", volume.id, instance_id),
                Err(e) if e.is_not_found() => debug!("Volume {} already gone", volume.id),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Resource for StackResource {
    fn name(&self) -> &str {
        "stack"
    }

    async fn ensure_created(&self, ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        if ctx.network.is_none() {
            info!("Stack for {}: no network yet", ctx.key());
            return Ok(Flow::cancel("network not allocated"));
        }

        let waiting_on = [
            ("peer role", ctx.peer_role_arn.is_none()),
            ("peering connection", ctx.peering_connection_id.is_none()),
            ("encryption key", ctx.encryption_key.is_none()),
        ];
        if let Some((dependency, _)) = waiting_on.iter().find(|(_, missing)| *missing) {
            info!("Stack for {}: waiting on {}", ctx.key(), dependency);
            return Ok(Flow::cancel(format!("waiting on {}", dependency)));
        }

        let name = stack_name(ctx.cluster_id());
        ctx.observed = ObservedStackState::capture(self.cloud.as_ref(), &name).await?;

        if !ctx.observed.exists() {
            info!("Stack {} for {} is absent, creating", name, ctx.key());
            return self.create(ctx, &name).await;
        }

        if ctx.observed.is_transitioning {
            info!("Stack {} for {} is transitioning ({:?})", name, ctx.key(), ctx.observed.status);
            return Ok(Flow::cancel(format!("stack {} is transitioning", name)));
        }

        let outputs = ctx
            .observed
            .outputs
            .clone()
            .ok_or_else(|| ControllerError::Detection(format!("stack {} has no outputs", name)))?;

        match decide(&ctx.cluster.spec, &ctx.observed)? {
            DecisionOutcome::ShouldUpdate => {
                info!("Stack {} for {} needs an update", name, ctx.key());
                self.update(ctx, &name, &outputs).await
            }
            DecisionOutcome::ShouldScale => {
                info!("Stack {} for {} needs scaling", name, ctx.key());
                self.scale(ctx, &name, &outputs).await
            }
            DecisionOutcome::Noop => {
                debug!("Stack {} for {} is up to date", name, ctx.key());
                Ok(Flow::Continue)
            }
        }
    }

    async fn ensure_deleted(&self, ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        self.delete(ctx).await
    }
}
