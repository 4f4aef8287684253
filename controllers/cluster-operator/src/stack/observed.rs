//! Observed stack state.
//!
//! Rebuilt from the provider at the start of every stack step and kept in
//! the tick context only; never reused across ticks.

use crate::error::ControllerError;
use cloud_client::{AutoScalingGroup, CloudProvider, Stack, StackStatus};
use tracing::debug;

pub const OUTPUT_MASTER_INSTANCE_TYPE: &str = "MasterInstanceType";
pub const OUTPUT_MASTER_IMAGE_ID: &str = "MasterImageID";
pub const OUTPUT_WORKER_INSTANCE_TYPE: &str = "WorkerInstanceType";
pub const OUTPUT_WORKER_DOCKER_VOLUME_SIZE: &str = "WorkerDockerVolumeSizeGB";
pub const OUTPUT_VERSION: &str = "VersionBundleVersion";
pub const OUTPUT_MASTER_INSTANCE_RESOURCE_NAME: &str = "MasterInstanceResourceName";
pub const OUTPUT_ETCD_VOLUME_RESOURCE_NAME: &str = "EtcdVolumeResourceName";
pub const OUTPUT_DOCKER_VOLUME_RESOURCE_NAME: &str = "DockerVolumeResourceName";
pub const OUTPUT_WORKER_ASG_NAME: &str = "WorkerASGName";

/// Facts read from the outputs of a settled stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutputs {
    pub master_instance_type: String,
    pub master_image_id: String,
    pub worker_instance_type: String,
    pub worker_docker_volume_size_gb: u32,
    pub version: String,
    pub master_instance_resource_name: String,
    pub etcd_volume_resource_name: String,
    pub docker_volume_resource_name: String,
    pub worker_asg_name: String,
}

impl StackOutputs {
    /// Read all outputs; any missing or malformed output is an error.
    pub fn from_stack(stack: &Stack) -> Result<Self, ControllerError> {
        let get = |key: &str| {
            stack.output(key).map(str::to_string).ok_or_else(|| {
                ControllerError::Detection(format!(
                    "stack {} ({:?}) has no output {}",
                    stack.name, stack.status, key
                ))
            })
        };

        let volume_size = get(OUTPUT_WORKER_DOCKER_VOLUME_SIZE)?;
        let worker_docker_volume_size_gb = volume_size.parse::<u32>().map_err(|e| {
            ControllerError::Detection(format!(
                "stack {} output {}={:?} is not a number: {}",
                stack.name, OUTPUT_WORKER_DOCKER_VOLUME_SIZE, volume_size, e
            ))
        })?;

        Ok(Self {
            master_instance_type: get(OUTPUT_MASTER_INSTANCE_TYPE)?,
            master_image_id: get(OUTPUT_MASTER_IMAGE_ID)?,
            worker_instance_type: get(OUTPUT_WORKER_INSTANCE_TYPE)?,
            worker_docker_volume_size_gb,
            version: get(OUTPUT_VERSION)?,
            master_instance_resource_name: get(OUTPUT_MASTER_INSTANCE_RESOURCE_NAME)?,
            etcd_volume_resource_name: get(OUTPUT_ETCD_VOLUME_RESOURCE_NAME)?,
            docker_volume_resource_name: get(OUTPUT_DOCKER_VOLUME_RESOURCE_NAME)?,
            worker_asg_name: get(OUTPUT_WORKER_ASG_NAME)?,
        })
    }
}

/// Last-known infrastructure facts for one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedStackState {
    /// Provider status; `None` when the stack does not exist
    pub status: Option<StackStatus>,
    /// A create, update or delete is still running
    pub is_transitioning: bool,
    /// Outputs of a settled stack
    pub outputs: Option<StackOutputs>,
    /// Worker autoscaling group, once it exists
    pub worker_asg: Option<AutoScalingGroup>,
}

impl ObservedStackState {
    /// The stack exists in some form.
    pub fn exists(&self) -> bool {
        self.status.is_some()
    }

    /// Describe the stack and its worker group.
    pub async fn capture(cloud: &dyn CloudProvider, stack_name: &str) -> Result<Self, ControllerError> {
        let stack = match cloud.describe_stack(stack_name).await {
            Ok(stack) => stack,
            Err(e) if e.is_not_found() => {
                debug!("Stack {} does not exist", stack_name);
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        if stack.status == StackStatus::DeleteComplete {
            return Ok(Self::default());
        }

        if stack.status.is_in_progress() {
            debug!("Stack {} is {:?}", stack_name, stack.status);
            return Ok(Self {
                status: Some(stack.status),
                is_transitioning: true,
                ..Self::default()
            });
        }

        let outputs = StackOutputs::from_stack(&stack)?;
        let worker_asg = match cloud.describe_auto_scaling_group(&outputs.worker_asg_name).await {
            Ok(asg) => Some(asg),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            status: Some(stack.status),
            is_transitioning: false,
            outputs: Some(outputs),
            worker_asg,
        })
    }
}
