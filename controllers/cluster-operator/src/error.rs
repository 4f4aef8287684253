//! Controller-specific error types.
//!
//! Sentinel conditions reported by the cloud provider (not found, already
//! exists, in progress) are matched where they occur and never reach this
//! type as failures. Everything here is retried by the controller's backoff.

use cloud_client::CloudError;
use kube::Error as KubeError;
use kube_runtime::finalizer::Error as FinalizerError;
use thiserror::Error;

/// Errors that can occur in the cluster operator.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Cloud provider API error
    #[error("Cloud provider error: {0}")]
    Cloud(#[from] CloudError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No free address block left in the pool
    #[error("Address space exhausted: {0}")]
    Exhausted(String),

    /// Network allocation failed
    #[error("Network allocation failed: {0}")]
    Allocation(String),

    /// Observed stack state could not be compared against the spec
    #[error("Stack detection failed: {0}")]
    Detection(String),

    /// Encryption backend error
    #[error("Encryption backend error: {0}")]
    Encryption(String),

    /// Stack body could not be rendered
    #[error("Stack rendering failed: {0}")]
    Render(String),

    /// Deletion has not finished yet; the finalizer must stay in place
    #[error("Cleanup pending: {0}")]
    CleanupPending(String),

    /// Finalizer bookkeeping failed
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<FinalizerError<ControllerError>>),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Whether repeating the same step right away can succeed.
    ///
    /// Exhaustion and configuration problems need operator intervention, so
    /// the per-step retry wrapper gives up on them immediately.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ControllerError::Exhausted(_)
                | ControllerError::InvalidConfig(_)
                | ControllerError::Render(_)
                | ControllerError::CleanupPending(_)
        )
    }
}
