//! Cloud provider client errors

use thiserror::Error;

/// Errors that can occur when interacting with the cloud provider gateway
#[derive(Debug, Error)]
pub enum CloudError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider API returned an error
    #[error("Cloud API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (invalid token, expired, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Another operation on the resource is underway
    #[error("Operation in progress: {0}")]
    InProgress(String),
}

impl CloudError {
    /// True for the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }

    /// True for the already-exists sentinel.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CloudError::AlreadyExists(_))
    }

    /// True for the in-progress sentinel.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, CloudError::InProgress(_))
    }
}
