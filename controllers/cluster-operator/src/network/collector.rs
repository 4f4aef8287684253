//! Reserved-range collector.
//!
//! Gathers every range already in use from three independent sources and
//! merges them into one canonical set. The fetches run concurrently and the
//! first failure aborts the collection: a partial list could let the
//! allocator hand out a block that is already taken.

use super::allocator::overlaps;
use crate::config::INSTALLATION_TAG;
use crate::error::ControllerError;
use crate::store::ClusterStore;
use cloud_client::CloudProvider;
use ipnet::Ipv4Net;
use std::sync::Arc;
use tracing::debug;

/// Collects reserved ranges for one installation
#[derive(Clone)]
pub struct ReservedRangeCollector {
    cloud: Arc<dyn CloudProvider>,
    store: Arc<dyn ClusterStore>,
    installation: String,
}

impl std::fmt::Debug for ReservedRangeCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservedRangeCollector")
            .field("installation", &self.installation)
            .finish_non_exhaustive()
    }
}

impl ReservedRangeCollector {
    pub fn new(cloud: Arc<dyn CloudProvider>, store: Arc<dyn ClusterStore>, installation: String) -> Self {
        Self { cloud, store, installation }
    }

    /// Collect all ranges in use, canonicalized against `pool`.
    pub async fn collect(&self, pool: Ipv4Net) -> Result<Vec<Ipv4Net>, ControllerError> {
        let (live, legacy, current) = futures::try_join!(
            self.live_networks(),
            self.store.legacy_network_cidrs(),
            self.store.tenant_network_cidrs(),
        )?;

        debug!(
            "Collected reserved ranges: {} live, {} legacy, {} tenant",
            live.len(),
            legacy.len(),
            current.len()
        );

        let mut ranges = Vec::with_capacity(live.len() + legacy.len() + current.len());
        for cidr in live.iter().chain(legacy.iter()).chain(current.iter()) {
            ranges.push(parse_range(cidr)?);
        }

        Ok(canonicalize(pool, ranges))
    }

    async fn live_networks(&self) -> Result<Vec<String>, ControllerError> {
        let vpcs = self
            .cloud
            .describe_vpcs(&[(INSTALLATION_TAG, self.installation.as_str())])
            .await?;
        Ok(vpcs.into_iter().map(|vpc| vpc.cidr).collect())
    }
}

fn parse_range(cidr: &str) -> Result<Ipv4Net, ControllerError> {
    cidr.parse::<Ipv4Net>()
        .map_err(|e| ControllerError::Allocation(format!("reserved range {:?} is not a valid IPv4 CIDR: {}", cidr, e)))
}

/// Truncate host bits, drop ranges that do not touch the pool, sort and
/// deduplicate.
pub fn canonicalize(pool: Ipv4Net, ranges: Vec<Ipv4Net>) -> Vec<Ipv4Net> {
    let pool = pool.trunc();
    let mut ranges: Vec<Ipv4Net> = ranges
        .into_iter()
        .map(|r| r.trunc())
        .filter(|r| overlaps(&pool, r))
        .collect();
    ranges.sort();
    ranges.dedup();
    ranges
}
