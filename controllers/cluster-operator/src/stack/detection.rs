//! Stack detection: compare observed facts against the desired spec.

use super::observed::ObservedStackState;
use crate::error::ControllerError;
use crds::TenantClusterSpec;
use tracing::info;

/// What the stack step should do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    Noop,
    ShouldScale,
    ShouldUpdate,
}

/// Whether the stack must be replaced-in-place with an update.
///
/// Checks, in order: master instance type, worker docker volume size, worker
/// instance type, release version. The first difference wins.
pub fn should_update(spec: &TenantClusterSpec, observed: &ObservedStackState) -> Result<bool, ControllerError> {
    let outputs = observed
        .outputs
        .as_ref()
        .ok_or_else(|| ControllerError::Detection(format!("no observed outputs for cluster {}", spec.cluster_id)))?;

    if outputs.master_instance_type != spec.master.instance_type {
        info!(
            "Cluster {}: master instance type changed from {} to {}",
            spec.cluster_id, outputs.master_instance_type, spec.master.instance_type
        );
        return Ok(true);
    }
    if outputs.worker_docker_volume_size_gb != spec.worker.docker_volume_size_gb {
        info!(
            "Cluster {}: worker docker volume size changed from {}GB to {}GB",
            spec.cluster_id, outputs.worker_docker_volume_size_gb, spec.worker.docker_volume_size_gb
        );
        return Ok(true);
    }
    if outputs.worker_instance_type != spec.worker.instance_type {
        info!(
            "Cluster {}: worker instance type changed from {} to {}",
            spec.cluster_id, outputs.worker_instance_type, spec.worker.instance_type
        );
        return Ok(true);
    }
    if outputs.version != spec.release_version {
        info!(
            "Cluster {}: version changed from {} to {}",
            spec.cluster_id, outputs.version, spec.release_version
        );
        return Ok(true);
    }

    Ok(false)
}

/// Whether the worker group bounds differ from the spec.
///
/// Always false until the worker group has been observed.
pub fn should_scale(spec: &TenantClusterSpec, observed: &ObservedStackState) -> bool {
    let Some(asg) = observed.worker_asg.as_ref() else {
        return false;
    };

    let desired = spec.worker.scaling;
    if asg.max_size != desired.max || asg.min_size != desired.min {
        info!(
            "Cluster {}: worker bounds changed from {}..{} to {}..{}",
            spec.cluster_id, asg.min_size, asg.max_size, desired.min, desired.max
        );
        return true;
    }
    false
}

/// Combine both checks; update takes precedence over scale.
pub fn decide(spec: &TenantClusterSpec, observed: &ObservedStackState) -> Result<DecisionOutcome, ControllerError> {
    if should_update(spec, observed)? {
        return Ok(DecisionOutcome::ShouldUpdate);
    }
    if should_scale(spec, observed) {
        return Ok(DecisionOutcome::ShouldScale);
    }
    Ok(DecisionOutcome::Noop)
}
