//! LegacyClusterConfig CRD
//!
//! The previous API shape for tenant clusters. The operator no longer
//! reconciles these objects, but clusters created through them still own
//! their network blocks, so their persisted CIDRs are read during allocation.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// LegacyClusterConfigSpec identifies a cluster created through the previous API
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "infra.tenantstack.io",
    version = "v1alpha1",
    kind = "LegacyClusterConfig",
    namespaced,
    status = "LegacyClusterConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct LegacyClusterConfigSpec {
    /// Cluster identifier
    pub cluster_id: String,

    /// Version bundle the cluster was created with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_bundle: Option<String>,
}

/// Status written by the previous operator
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct LegacyClusterConfigStatus {
    /// Cluster-level status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<LegacyClusterStatus>,
}

/// Cluster-level status of a legacy cluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct LegacyClusterStatus {
    /// Network block owned by the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<LegacyNetworkStatus>,
}

/// Network block owned by a legacy cluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct LegacyNetworkStatus {
    /// Allocated CIDR; empty if none was persisted
    #[serde(default)]
    pub cidr: String,
}

impl LegacyClusterConfig {
    /// Returns the persisted CIDR, if any.
    pub fn network_cidr(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.cluster.as_ref())
            .and_then(|c| c.network.as_ref())
            .map(|n| n.cidr.as_str())
            .filter(|cidr| !cidr.is_empty())
    }
}
