//! Compute and storage operations for MockCloudProvider
//!
//! Instances stop and terminate immediately; volumes detach immediately.

use super::{matches_filters, CloudCall, MockCloudProvider};
use crate::error::CloudError;
use crate::models::*;

pub async fn describe_instances(client: &MockCloudProvider, filters: &[(&str, &str)]) -> Result<Vec<Instance>, CloudError> {
    client.check_failure("describe_instances")?;
    let mut instances: Vec<Instance> = client.instances
        .lock()
        .unwrap()
        .values()
        .filter(|i| matches_filters(&i.tags, filters))
        .cloned()
        .collect();
    instances.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(instances)
}

pub async fn stop_instance(client: &MockCloudProvider, id: &str) -> Result<(), CloudError> {
    client.check_failure("stop_instance")?;
    client.record(CloudCall::StopInstance(id.to_string()));
    set_instance_state(client, id, InstanceState::Stopped)
}

pub async fn terminate_instance(client: &MockCloudProvider, id: &str) -> Result<(), CloudError> {
    client.check_failure("terminate_instance")?;
    client.record(CloudCall::TerminateInstance(id.to_string()));
    set_instance_state(client, id, InstanceState::Terminated)
}

fn set_instance_state(client: &MockCloudProvider, id: &str, state: InstanceState) -> Result<(), CloudError> {
    let mut instances = client.instances.lock().unwrap();
    let instance = instances
        .get_mut(id)
        .ok_or_else(|| CloudError::NotFound(format!("Instance {} not found", id)))?;
    instance.state = state;
    Ok(())
}

pub async fn describe_auto_scaling_group(client: &MockCloudProvider, name: &str) -> Result<AutoScalingGroup, CloudError> {
    client.check_failure("describe_auto_scaling_group")?;
    client.asgs
        .lock()
        .unwrap()
        .get(name)
        .cloned()
        .ok_or_else(|| CloudError::NotFound(format!("Autoscaling group {} not found", name)))
}

pub async fn describe_volumes(client: &MockCloudProvider, filters: &[(&str, &str)]) -> Result<Vec<Volume>, CloudError> {
    client.check_failure("describe_volumes")?;
    let mut volumes: Vec<Volume> = client.volumes
        .lock()
        .unwrap()
        .values()
        .filter(|v| matches_filters(&v.tags, filters))
        .cloned()
        .collect();
    volumes.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(volumes)
}

pub async fn detach_volume(client: &MockCloudProvider, volume_id: &str, instance_id: &str, force: bool) -> Result<(), CloudError> {
    client.check_failure("detach_volume")?;
    client.record(CloudCall::DetachVolume {
        volume_id: volume_id.to_string(),
        instance_id: instance_id.to_string(),
        force,
    });

    let mut volumes = client.volumes.lock().unwrap();
    let volume = volumes
        .get_mut(volume_id)
        .ok_or_else(|| CloudError::NotFound(format!("Volume {} not found", volume_id)))?;
    volume.attachments.retain(|a| a.instance_id != instance_id);
    Ok(())
}

pub async fn delete_volume(client: &MockCloudProvider, volume_id: &str) -> Result<(), CloudError> {
    client.check_failure("delete_volume")?;
    client.record(CloudCall::DeleteVolume(volume_id.to_string()));

    let mut volumes = client.volumes.lock().unwrap();
    match volumes.get(volume_id) {
        None => Err(CloudError::NotFound(format!("Volume {} not found", volume_id))),
        Some(v) if !v.attachments.is_empty() => {
            Err(CloudError::Api(format!("Volume {} is still attached", volume_id)))
        }
        Some(_) => {
            volumes.remove(volume_id);
            Ok(())
        }
    }
}
