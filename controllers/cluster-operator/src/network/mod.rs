//! Tenant cluster network allocation.
//!
//! - `collector`: reserved ranges from the cloud and from persisted objects
//! - `allocator`: serialized first-fit allocation
//! - `splitter`: equal subdivision of a block
//!
//! [`NetworkResource`] is the first step of every tick. It either exposes the
//! already-persisted network to the rest of the chain or allocates one,
//! persists it and cancels the tick.

pub mod allocator;
pub mod collector;
pub mod splitter;

#[cfg(test)]
mod collector_test;

pub use allocator::{AllocationCallbacks, NetworkAllocator};
pub use collector::ReservedRangeCollector;
pub use splitter::{calculate_mask, split_network};

use crate::context::TickContext;
use crate::error::ControllerError;
use crate::resource::{Flow, Resource};
use crate::store::ClusterStore;
use ipnet::Ipv4Net;
use std::sync::Arc;
use tracing::info;

/// Allocation request for one cluster, live for one tick
struct ClusterAllocation<'a> {
    collector: &'a ReservedRangeCollector,
    store: &'a dyn ClusterStore,
    pool: Ipv4Net,
    namespace: &'a str,
    name: &'a str,
}

#[async_trait::async_trait]
impl AllocationCallbacks for ClusterAllocation<'_> {
    async fn reserved_networks(&self) -> Result<Vec<Ipv4Net>, ControllerError> {
        self.collector.collect(self.pool).await
    }

    async fn persist_allocated_network(&self, block: Ipv4Net) -> Result<(), ControllerError> {
        self.store
            .persist_network_cidr(self.namespace, self.name, &block.to_string())
            .await
    }
}

/// Network allocation step
pub struct NetworkResource {
    allocator: Arc<NetworkAllocator>,
    collector: ReservedRangeCollector,
    store: Arc<dyn ClusterStore>,
    pool: Ipv4Net,
    prefix_len: u8,
}

impl std::fmt::Debug for NetworkResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkResource")
            .field("pool", &self.pool)
            .field("prefix_len", &self.prefix_len)
            .finish_non_exhaustive()
    }
}

impl NetworkResource {
    pub fn new(
        allocator: Arc<NetworkAllocator>,
        collector: ReservedRangeCollector,
        store: Arc<dyn ClusterStore>,
        pool: Ipv4Net,
        prefix_len: u8,
    ) -> Self {
        Self {
            allocator,
            collector,
            store,
            pool,
            prefix_len,
        }
    }
}

#[async_trait::async_trait]
impl Resource for NetworkResource {
    fn name(&self) -> &str {
        "network"
    }

    async fn ensure_created(&self, ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        if let Some(cidr) = ctx.cluster.network_cidr() {
            let network = cidr.parse::<Ipv4Net>().map_err(|e| {
                ControllerError::Allocation(format!("persisted network {:?} of {} is invalid: {}", cidr, ctx.key(), e))
            })?;
            ctx.network = Some(network);
            return Ok(Flow::Continue);
        }

        info!("TenantCluster {} has no network, allocating from {}", ctx.key(), self.pool);
        let request = ClusterAllocation {
            collector: &self.collector,
            store: self.store.as_ref(),
            pool: self.pool,
            namespace: &ctx.namespace,
            name: &ctx.name,
        };
        let block = self.allocator.allocate(self.pool, self.prefix_len, &request).await?;

        Ok(Flow::cancel(format!("allocated network {}, waiting for it to appear in status", block)))
    }

    async fn ensure_deleted(&self, _ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        // The block is released when the object and its status disappear.
        Ok(Flow::Continue)
    }
}
