//! Retry decorator for resource steps.
//!
//! Wraps any [`Resource`] and re-runs a failing step with exponential
//! backoff before giving up and handing the error to the controller.
//! Cancellations and non-retryable errors pass straight through.

use super::{Flow, Resource};
use crate::backoff::ExponentialBackoff;
use crate::context::TickContext;
use crate::error::ControllerError;
use std::time::Duration;
use tracing::warn;

/// Retry policy for a wrapped resource
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// A resource whose steps are retried according to a [`RetryPolicy`]
pub struct RetryResource<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R: Resource> RetryResource<R> {
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run(&self, step: Step, ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        let mut attempt = 0;
        loop {
            let result = match step {
                Step::Create => self.inner.ensure_created(ctx).await,
                Step::Delete => self.inner.ensure_deleted(ctx).await,
            };

            match result {
                Ok(flow) => return Ok(flow),
                Err(e) if e.is_retryable() && attempt + 1 < self.policy.max_attempts => {
                    let delay = ExponentialBackoff::for_attempt(attempt, self.policy.initial_delay, self.policy.max_delay);
                    warn!(
                        "{} {:?} failed for {} (attempt {}/{}), retrying in {:?}: {}",
                        self.inner.name(),
                        step,
                        ctx.key(),
                        attempt + 1,
                        self.policy.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Create,
    Delete,
}

impl<R> std::fmt::Debug for RetryResource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryResource").field("policy", &self.policy).finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<R: Resource> Resource for RetryResource<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn ensure_created(&self, ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        self.run(Step::Create, ctx).await
    }

    async fn ensure_deleted(&self, ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        self.run(Step::Delete, ctx).await
    }
}
