//! Cloud Provider Gateway Client
//!
//! A Rust client library for the cloud provider gateway used by the tenant
//! cluster operator. Covers the network, stack, compute, storage, key
//! management and identity operations the operator consumes.
//!
//! # Example
//!
//! ```no_run
//! use cloud_client::{CloudClient, CloudProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CloudClient::new(
//!     "http://cloud-gateway.infra:8080".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! // Networks already in use by this installation
//! let vpcs = client.describe_vpcs(&[("installation", "gauss")]).await?;
//!
//! // Stack state for one tenant cluster
//! let stack = client.describe_stack("cluster-a1b2c-tccp").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error sentinels
//!
//! `CloudError::NotFound`, `CloudError::AlreadyExists` and
//! `CloudError::InProgress` are reported distinctly so callers can treat
//! them as success or as a reason to wait.

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod provider_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::CloudClient;
pub use common::HttpClient;
pub use error::CloudError;
pub use models::*;
pub use provider_trait::CloudProvider;
#[cfg(feature = "test-util")]
pub use mock::{CloudCall, MockCloudProvider};
