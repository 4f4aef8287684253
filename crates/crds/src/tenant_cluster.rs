//! TenantCluster CRD
//!
//! Describes the desired infrastructure of one tenant cluster. The operator
//! derives the stack shape from the spec on every reconciliation and writes
//! exactly one status field back: the allocated network block.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// TenantClusterSpec defines the desired state of a tenant cluster
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "infra.tenantstack.io",
    version = "v1alpha1",
    kind = "TenantCluster",
    namespaced,
    status = "TenantClusterStatus",
    shortname = "tc",
    printcolumn = r#"{"name":"CIDR","type":"string","jsonPath":".status.network.cidr"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.releaseVersion"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TenantClusterSpec {
    /// Cluster identifier, used for stack names and resource tags
    pub cluster_id: String,

    /// Release version deployed to the cluster (e.g. "11.3.0")
    pub release_version: String,

    /// Master node shape
    pub master: MasterSpec,

    /// Worker node shape and scaling bounds
    pub worker: WorkerSpec,

    /// Number of availability zones the cluster spans
    #[serde(default = "default_availability_zones")]
    #[schemars(range(min = 1))]
    pub availability_zones: u32,

    /// Enable detailed instance monitoring
    #[serde(default)]
    pub detailed_monitoring: bool,
}

fn default_availability_zones() -> u32 {
    1
}

/// Master node shape
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MasterSpec {
    /// Instance type (e.g. "m5.xlarge")
    pub instance_type: String,

    /// Machine image identifier
    pub image_id: String,

    /// Size of the etcd data volume in GB
    #[serde(default = "default_etcd_volume_size")]
    pub etcd_volume_size_gb: u32,

    /// Size of the docker data volume in GB
    #[serde(default = "default_docker_volume_size")]
    pub docker_volume_size_gb: u32,
}

fn default_etcd_volume_size() -> u32 {
    100
}

fn default_docker_volume_size() -> u32 {
    100
}

/// Worker node shape and scaling bounds
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSpec {
    /// Instance type (e.g. "m5.xlarge")
    pub instance_type: String,

    /// Machine image identifier
    pub image_id: String,

    /// Size of the docker data volume in GB
    #[serde(default = "default_docker_volume_size")]
    pub docker_volume_size_gb: u32,

    /// Autoscaling bounds
    pub scaling: ScalingBounds,
}

/// Autoscaling group bounds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScalingBounds {
    /// Minimum number of workers
    pub min: u32,

    /// Maximum number of workers
    pub max: u32,
}

/// TenantClusterStatus defines the observed state of a tenant cluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TenantClusterStatus {
    /// Network allocated to this cluster (write-once)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<ClusterNetworkStatus>,
}

/// Network block allocated from the installation pool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkStatus {
    /// Allocated CIDR block (e.g. "10.1.0.0/24")
    #[serde(default)]
    pub cidr: String,
}

impl TenantCluster {
    /// Returns the allocated CIDR if the allocation has been persisted.
    pub fn network_cidr(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.network.as_ref())
            .map(|n| n.cidr.as_str())
            .filter(|cidr| !cidr.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TenantClusterSpec {
        TenantClusterSpec {
            cluster_id: "a1b2c".to_string(),
            release_version: "11.3.0".to_string(),
            master: MasterSpec {
                instance_type: "m5.xlarge".to_string(),
                image_id: "ami-1".to_string(),
                etcd_volume_size_gb: 100,
                docker_volume_size_gb: 100,
            },
            worker: WorkerSpec {
                instance_type: "m5.large".to_string(),
                image_id: "ami-1".to_string(),
                docker_volume_size_gb: 50,
                scaling: ScalingBounds { min: 3, max: 5 },
            },
            availability_zones: 1,
            detailed_monitoring: false,
        }
    }

    #[test]
    fn test_network_cidr_empty_is_unset() {
        let mut cluster = TenantCluster::new("a1b2c", spec());
        assert_eq!(cluster.network_cidr(), None);

        cluster.status = Some(TenantClusterStatus {
            network: Some(ClusterNetworkStatus { cidr: String::new() }),
        });
        assert_eq!(cluster.network_cidr(), None);

        cluster.status = Some(TenantClusterStatus {
            network: Some(ClusterNetworkStatus { cidr: "10.1.0.0/24".to_string() }),
        });
        assert_eq!(cluster.network_cidr(), Some("10.1.0.0/24"));
    }

    #[test]
    fn test_spec_defaults_applied() {
        let raw = serde_json::json!({
            "clusterId": "a1b2c",
            "releaseVersion": "11.3.0",
            "master": { "instanceType": "m5.xlarge", "imageId": "ami-1" },
            "worker": {
                "instanceType": "m5.large",
                "imageId": "ami-1",
                "scaling": { "min": 1, "max": 2 }
            }
        });
        let spec: TenantClusterSpec = serde_json::from_value(raw).unwrap();
        assert_eq!(spec.availability_zones, 1);
        assert_eq!(spec.master.etcd_volume_size_gb, 100);
        assert_eq!(spec.worker.docker_volume_size_gb, 100);
        assert!(!spec.detailed_monitoring);
    }

    #[test]
    fn test_crd_requires_at_least_one_zone() {
        use kube::CustomResourceExt;

        let crd = serde_json::to_value(TenantCluster::crd()).unwrap();
        let zones = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["spec"]["properties"]
            ["availabilityZones"];
        assert_eq!(zones["minimum"].as_f64(), Some(1.0));
    }
}
