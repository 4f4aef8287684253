//! Resource convergence contract.
//!
//! Every step of a tick is a [`Resource`] with idempotent `ensure_created` /
//! `ensure_deleted` operations. A step either lets the tick continue, cancels
//! the remainder of the tick (progress depends on something converging
//! elsewhere) or fails with an error. Cancellation is not an error: the
//! controller still schedules a future tick, just without backoff.

mod retry;
#[cfg(test)]
mod retry_test;

pub use retry::{RetryPolicy, RetryResource};

use crate::context::TickContext;
use crate::error::ControllerError;
use tracing::{debug, info};

/// Control flow returned by a resource step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Proceed with the next resource
    Continue,
    /// Skip the remaining resources of this tick
    Cancel(String),
}

impl Flow {
    pub fn cancel(reason: impl Into<String>) -> Self {
        Flow::Cancel(reason.into())
    }
}

/// One idempotent step of a reconciliation tick
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Drive the external state toward existence.
    async fn ensure_created(&self, ctx: &mut TickContext) -> Result<Flow, ControllerError>;

    /// Drive the external state toward absence.
    async fn ensure_deleted(&self, ctx: &mut TickContext) -> Result<Flow, ControllerError>;
}

/// Result of running a full chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every resource returned `Flow::Continue`
    Completed,
    /// A resource cancelled the rest of the tick
    Cancelled { resource: String, reason: String },
}

/// Run `ensure_created` over the chain in declared order.
pub async fn run_create_chain(
    resources: &[Box<dyn Resource>],
    ctx: &mut TickContext,
) -> Result<TickOutcome, ControllerError> {
    for resource in resources {
        debug!("Ensuring {} created for {}", resource.name(), ctx.key());
        if let Flow::Cancel(reason) = resource.ensure_created(ctx).await? {
            info!("Tick for {} cancelled by {}: {}", ctx.key(), resource.name(), reason);
            return Ok(TickOutcome::Cancelled {
                resource: resource.name().to_string(),
                reason,
            });
        }
    }
    Ok(TickOutcome::Completed)
}

/// Run `ensure_deleted` over the chain in reverse order.
pub async fn run_delete_chain(
    resources: &[Box<dyn Resource>],
    ctx: &mut TickContext,
) -> Result<TickOutcome, ControllerError> {
    for resource in resources.iter().rev() {
        debug!("Ensuring {} deleted for {}", resource.name(), ctx.key());
        if let Flow::Cancel(reason) = resource.ensure_deleted(ctx).await? {
            info!("Deletion tick for {} cancelled by {}: {}", ctx.key(), resource.name(), reason);
            return Ok(TickOutcome::Cancelled {
                resource: resource.name().to_string(),
                reason,
            });
        }
    }
    Ok(TickOutcome::Completed)
}
