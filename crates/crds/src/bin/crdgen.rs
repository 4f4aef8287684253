//! Prints all CRDs as a multi-document YAML stream.

use crds::{LegacyClusterConfig, TenantCluster};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [TenantCluster::crd(), LegacyClusterConfig::crd()];

    for crd in crds {
        println!("---");
        print!("{}", serde_yaml::to_string(&crd)?);
    }

    Ok(())
}
