//! Tenant Stack CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the tenant cluster operator.

pub mod legacy_cluster_config;
pub mod tenant_cluster;

pub use legacy_cluster_config::*;
pub use tenant_cluster::*;
