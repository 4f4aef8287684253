//! Network allocator.
//!
//! Hands out one free block of the requested prefix length from the pool.
//! Decisions are serialized through a lock owned by the allocator instance;
//! one instance is constructed per process and shared by handle.

use crate::error::ControllerError;
use ipnet::Ipv4Net;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Callbacks supplied by the caller for one allocation
#[async_trait::async_trait]
pub trait AllocationCallbacks: Send + Sync {
    /// Fetch every range currently in use. Must be a live read.
    async fn reserved_networks(&self) -> Result<Vec<Ipv4Net>, ControllerError>;

    /// Durably record the chosen block.
    async fn persist_allocated_network(&self, block: Ipv4Net) -> Result<(), ControllerError>;
}

/// Serializing allocator for tenant cluster networks
#[derive(Debug, Default)]
pub struct NetworkAllocator {
    lock: Mutex<()>,
}

impl NetworkAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a `/prefix_len` block from `pool` and persist it.
    ///
    /// At most one allocation is in flight per allocator. If persisting fails
    /// the block is not considered allocated and the error is returned; the
    /// lock is released either way.
    pub async fn allocate(
        &self,
        pool: Ipv4Net,
        prefix_len: u8,
        callbacks: &dyn AllocationCallbacks,
    ) -> Result<Ipv4Net, ControllerError> {
        let _guard = self.lock.lock().await;

        let reserved = callbacks.reserved_networks().await?;
        debug!("Allocating /{} from {} with {} reserved ranges", prefix_len, pool, reserved.len());

        let block = free_block(pool, prefix_len, &reserved)?;
        callbacks.persist_allocated_network(block).await?;

        info!("Allocated network {} from pool {}", block, pool);
        Ok(block)
    }
}

/// First `/prefix_len` block in `pool`, by ascending address, that does not
/// overlap any of `reserved`.
pub fn free_block(pool: Ipv4Net, prefix_len: u8, reserved: &[Ipv4Net]) -> Result<Ipv4Net, ControllerError> {
    let pool = pool.trunc();
    if prefix_len < pool.prefix_len() {
        return Err(ControllerError::Exhausted(format!(
            "a /{} block does not fit in {}",
            prefix_len, pool
        )));
    }

    let mut candidates = pool.subnets(prefix_len).map_err(|e| {
        ControllerError::Allocation(format!("invalid prefix length /{}: {}", prefix_len, e))
    })?;

    candidates
        .find(|candidate| !reserved.iter().any(|r| overlaps(candidate, r)))
        .ok_or_else(|| ControllerError::Exhausted(format!("no free /{} block left in {}", prefix_len, pool)))
}

/// Whether two blocks share at least one address.
pub fn overlaps(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}
