//! Test utilities for unit testing the resource chain
//!
//! This module provides helpers for creating test clusters, seeding the mock
//! cloud with a settled stack and an in-memory `ClusterStore`.

use crate::config::{CLUSTER_TAG, LOGICAL_ID_TAG};
use crate::context::TickContext;
use crate::error::ControllerError;
use crate::stack::observed::*;
use crate::stack::stack_name;
use crate::store::ClusterStore;
use cloud_client::{
    AutoScalingGroup, Instance, InstanceState, MockCloudProvider, Stack, StackOutput, StackStatus, Tags, Volume,
    VolumeAttachment,
};
use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::HashMap;
use std::sync::Mutex;

pub const TEST_CLUSTER_ID: &str = "a1b2c";

/// Helper to create a test TenantCluster, optionally with an allocated network
pub fn create_test_cluster(name: &str, namespace: &str, cidr: Option<&str>) -> TenantCluster {
    TenantCluster {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: TenantClusterSpec {
            cluster_id: TEST_CLUSTER_ID.to_string(),
            release_version: "11.3.0".to_string(),
            master: MasterSpec {
                instance_type: "m5.xlarge".to_string(),
                image_id: "ami-master".to_string(),
                etcd_volume_size_gb: 100,
                docker_volume_size_gb: 100,
            },
            worker: WorkerSpec {
                instance_type: "m5.large".to_string(),
                image_id: "ami-worker".to_string(),
                docker_volume_size_gb: 100,
                scaling: ScalingBounds { min: 3, max: 5 },
            },
            availability_zones: 1,
            detailed_monitoring: false,
        },
        status: cidr.map(|cidr| TenantClusterStatus {
            network: Some(ClusterNetworkStatus { cidr: cidr.to_string() }),
        }),
    }
}

/// Tick context with every stack dependency already resolved
pub fn ready_context(cluster: &TenantCluster) -> TickContext {
    let mut ctx = TickContext::new(cluster).unwrap();
    ctx.network = cluster.network_cidr().map(|cidr| cidr.parse().unwrap());
    ctx.peer_role_arn = Some("arn:role/gauss-vpc-peer-access".to_string());
    ctx.peering_connection_id = Some("pcx-0001".to_string());
    ctx.encryption_key = Some("arn:mock:kms:key/key-00000001".to_string());
    ctx
}

/// Outputs of a settled stack that matches `create_test_cluster`
pub fn stable_outputs(cluster: &TenantCluster, suffix: &str) -> Vec<StackOutput> {
    let spec = &cluster.spec;
    let output = |key: &str, value: String| StackOutput {
        key: key.to_string(),
        value,
    };
    vec![
        output(OUTPUT_MASTER_INSTANCE_TYPE, spec.master.instance_type.clone()),
        output(OUTPUT_MASTER_IMAGE_ID, spec.master.image_id.clone()),
        output(OUTPUT_WORKER_INSTANCE_TYPE, spec.worker.instance_type.clone()),
        output(OUTPUT_WORKER_DOCKER_VOLUME_SIZE, spec.worker.docker_volume_size_gb.to_string()),
        output(OUTPUT_VERSION, spec.release_version.clone()),
        output(OUTPUT_MASTER_INSTANCE_RESOURCE_NAME, format!("MasterInstance{}", suffix)),
        output(OUTPUT_ETCD_VOLUME_RESOURCE_NAME, format!("EtcdVolume{}", suffix)),
        output(OUTPUT_DOCKER_VOLUME_RESOURCE_NAME, format!("DockerVolume{}", suffix)),
        output(OUTPUT_WORKER_ASG_NAME, format!("cluster-{}-workers", spec.cluster_id)),
    ]
}

fn cluster_tags(logical_id: &str) -> Tags {
    [
        (CLUSTER_TAG.to_string(), TEST_CLUSTER_ID.to_string()),
        (LOGICAL_ID_TAG.to_string(), logical_id.to_string()),
    ]
    .into_iter()
    .collect()
}

/// Seed the mock with a settled stack for `cluster`: outputs, worker group,
/// a running master instance and its two attached data volumes.
pub fn seed_stable_stack(cloud: &MockCloudProvider, cluster: &TenantCluster, suffix: &str) {
    let master_id = "i-master-0001".to_string();

    cloud.add_stack(Stack {
        name: stack_name(&cluster.spec.cluster_id),
        status: StackStatus::CreateComplete,
        outputs: stable_outputs(cluster, suffix),
        termination_protection: true,
        last_updated: None,
    });
    cloud.add_auto_scaling_group(AutoScalingGroup {
        name: format!("cluster-{}-workers", cluster.spec.cluster_id),
        min_size: cluster.spec.worker.scaling.min,
        max_size: cluster.spec.worker.scaling.max,
        desired_capacity: cluster.spec.worker.scaling.min,
    });
    cloud.add_instance(Instance {
        id: master_id.clone(),
        instance_type: cluster.spec.master.instance_type.clone(),
        state: InstanceState::Running,
        tags: cluster_tags(&format!("MasterInstance{}", suffix)),
    });
    for (id, logical_id, device) in [
        ("vol-etcd-0001", format!("EtcdVolume{}", suffix), "/dev/xvdc"),
        ("vol-docker-0001", format!("DockerVolume{}", suffix), "/dev/xvdh"),
    ] {
        cloud.add_volume(Volume {
            id: id.to_string(),
            size_gb: 100,
            attachments: vec![VolumeAttachment {
                instance_id: master_id.clone(),
                device: device.to_string(),
            }],
            tags: cluster_tags(&logical_id),
        });
    }
}

/// In-memory `ClusterStore`
///
/// Persisted networks are keyed by `namespace/name` and follow the same
/// write-once rule as the Kubernetes store.
#[derive(Debug, Default)]
pub struct InMemoryClusterStore {
    pub tenant_cidrs: Mutex<Vec<String>>,
    pub legacy_cidrs: Mutex<Vec<String>>,
    pub persisted: Mutex<HashMap<String, String>>,
    pub failure: Mutex<Option<String>>,
}

impl InMemoryClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cidrs(tenant: &[&str], legacy: &[&str]) -> Self {
        let store = Self::new();
        *store.tenant_cidrs.lock().unwrap() = tenant.iter().map(|s| s.to_string()).collect();
        *store.legacy_cidrs.lock().unwrap() = legacy.iter().map(|s| s.to_string()).collect();
        store
    }

    /// Make every store call fail until cleared
    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().unwrap() = message.map(str::to_string);
    }

    pub fn persisted_cidr(&self, namespace: &str, name: &str) -> Option<String> {
        self.persisted.lock().unwrap().get(&format!("{}/{}", namespace, name)).cloned()
    }

    fn check_failure(&self) -> Result<(), ControllerError> {
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(ControllerError::Allocation(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ClusterStore for InMemoryClusterStore {
    async fn tenant_network_cidrs(&self) -> Result<Vec<String>, ControllerError> {
        self.check_failure()?;
        let mut cidrs = self.tenant_cidrs.lock().unwrap().clone();
        cidrs.extend(self.persisted.lock().unwrap().values().cloned());
        Ok(cidrs)
    }

    async fn legacy_network_cidrs(&self) -> Result<Vec<String>, ControllerError> {
        self.check_failure()?;
        Ok(self.legacy_cidrs.lock().unwrap().clone())
    }

    async fn persist_network_cidr(&self, namespace: &str, name: &str, cidr: &str) -> Result<(), ControllerError> {
        self.check_failure()?;
        let mut persisted = self.persisted.lock().unwrap();
        let key = format!("{}/{}", namespace, name);
        match persisted.get(&key) {
            Some(existing) if existing == cidr => Ok(()),
            Some(existing) => Err(ControllerError::Allocation(format!(
                "{} already has network {}",
                key, existing
            ))),
            None => {
                persisted.insert(key, cidr.to_string());
                Ok(())
            }
        }
    }
}
