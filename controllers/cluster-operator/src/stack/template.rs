//! Stack body rendering.
//!
//! The body sent to the provider is the JSON form of [`StackParameters`].
//! Rendering is deterministic for a given spec, network and set of
//! resource names.

use super::observed::StackOutputs;
use crate::context::TickContext;
use crate::error::ControllerError;
use crate::network::split_network;
use ipnet::Ipv4Net;
use serde::Serialize;

/// Logical names of the master instance and its data volumes.
///
/// Fresh names force the provider to create replacement resources instead
/// of colliding with the ones being replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNames {
    pub master_instance: String,
    pub etcd_volume: String,
    pub docker_volume: String,
}

impl ResourceNames {
    /// New names with a random suffix.
    pub fn fresh() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self::with_suffix(&uuid[..8])
    }

    pub fn with_suffix(suffix: &str) -> Self {
        Self {
            master_instance: format!("MasterInstance{}", suffix),
            etcd_volume: format!("EtcdVolume{}", suffix),
            docker_volume: format!("DockerVolume{}", suffix),
        }
    }

    /// Names currently deployed, as reported by the stack outputs.
    pub fn from_outputs(outputs: &StackOutputs) -> Self {
        Self {
            master_instance: outputs.master_instance_resource_name.clone(),
            etcd_volume: outputs.etcd_volume_resource_name.clone(),
            docker_volume: outputs.docker_volume_resource_name.clone(),
        }
    }
}

/// Public and private subnet of one availability zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSubnets {
    pub public: Ipv4Net,
    pub private: Ipv4Net,
}

/// Split the cluster network into one block per zone, each into a public
/// and a private half.
pub fn zone_subnets(network: Ipv4Net, zones: u32) -> Result<Vec<ZoneSubnets>, ControllerError> {
    split_network(network, zones)?
        .into_iter()
        .map(|zone| {
            let halves = split_network(zone, 2)?;
            Ok(ZoneSubnets {
                public: halves[0],
                private: halves[1],
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterParameters {
    pub instance_type: String,
    pub image_id: String,
    pub etcd_volume_size_gb: u32,
    pub docker_volume_size_gb: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerParameters {
    pub instance_type: String,
    pub image_id: String,
    pub docker_volume_size_gb: u32,
    pub min_size: u32,
    pub max_size: u32,
}

/// Everything the stack body is rendered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackParameters {
    pub cluster_id: String,
    pub installation: String,
    pub version: String,
    pub network: Ipv4Net,
    pub subnets: Vec<ZoneSubnets>,
    pub master: MasterParameters,
    pub worker: WorkerParameters,
    pub detailed_monitoring: bool,
    pub resource_names: ResourceNames,
    pub peer_role_arn: String,
    pub peering_connection_id: String,
    pub encryption_key: String,
}

impl StackParameters {
    /// Collect parameters from the tick context.
    ///
    /// Fails if a dependency output the stack needs is missing or the spec
    /// asks for no availability zones.
    pub fn from_context(ctx: &TickContext, installation: &str, names: ResourceNames) -> Result<Self, ControllerError> {
        let missing = |what: &str| ControllerError::Render(format!("{} is not known for {}", what, ctx.key()));

        let network = ctx.network.ok_or_else(|| missing("network"))?;
        let spec = &ctx.cluster.spec;
        if spec.availability_zones == 0 {
            return Err(ControllerError::Render(format!(
                "{} must span at least one availability zone",
                ctx.key()
            )));
        }

        Ok(Self {
            cluster_id: spec.cluster_id.clone(),
            installation: installation.to_string(),
            version: spec.release_version.clone(),
            network,
            subnets: zone_subnets(network, spec.availability_zones)?,
            master: MasterParameters {
                instance_type: spec.master.instance_type.clone(),
                image_id: spec.master.image_id.clone(),
                etcd_volume_size_gb: spec.master.etcd_volume_size_gb,
                docker_volume_size_gb: spec.master.docker_volume_size_gb,
            },
            worker: WorkerParameters {
                instance_type: spec.worker.instance_type.clone(),
                image_id: spec.worker.image_id.clone(),
                docker_volume_size_gb: spec.worker.docker_volume_size_gb,
                min_size: spec.worker.scaling.min,
                max_size: spec.worker.scaling.max,
            },
            detailed_monitoring: spec.detailed_monitoring,
            resource_names: names,
            peer_role_arn: ctx.peer_role_arn.clone().ok_or_else(|| missing("peer role"))?,
            peering_connection_id: ctx.peering_connection_id.clone().ok_or_else(|| missing("peering connection"))?,
            encryption_key: ctx.encryption_key.clone().ok_or_else(|| missing("encryption key"))?,
        })
    }

    /// Render the stack body.
    pub fn render(&self) -> Result<String, ControllerError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ControllerError::Render(format!("stack body for {}: {}", self.cluster_id, e)))
    }
}
