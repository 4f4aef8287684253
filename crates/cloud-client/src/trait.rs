//! CloudProvider trait for mocking
//!
//! This trait abstracts the provider gateway client to enable mocking in unit tests.
//! The concrete CloudClient implements this trait, and tests can use mock implementations.

use crate::error::CloudError;
use crate::models::*;

/// Trait for cloud provider operations
///
/// Sentinel conditions are reported as `CloudError::NotFound`,
/// `CloudError::AlreadyExists` and `CloudError::InProgress`; callers decide
/// which of them count as success.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait CloudProvider: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Validate the API token
    async fn validate_token(&self) -> Result<(), CloudError>;

    // Network Operations
    async fn describe_vpcs(&self, filters: &[(&str, &str)]) -> Result<Vec<Vpc>, CloudError>;
    async fn describe_vpc_peering_connections(&self, filters: &[(&str, &str)]) -> Result<Vec<VpcPeeringConnection>, CloudError>;

    // Stack Operations
    async fn describe_stack(&self, name: &str) -> Result<Stack, CloudError>;
    async fn create_stack(&self, request: CreateStackRequest) -> Result<(), CloudError>;
    async fn update_stack(&self, request: UpdateStackRequest) -> Result<(), CloudError>;
    async fn delete_stack(&self, name: &str) -> Result<(), CloudError>;
    async fn set_termination_protection(&self, name: &str, enabled: bool) -> Result<(), CloudError>;

    // Compute Operations
    async fn describe_instances(&self, filters: &[(&str, &str)]) -> Result<Vec<Instance>, CloudError>;
    async fn stop_instance(&self, id: &str) -> Result<(), CloudError>;
    async fn terminate_instance(&self, id: &str) -> Result<(), CloudError>;
    async fn describe_auto_scaling_group(&self, name: &str) -> Result<AutoScalingGroup, CloudError>;

    // Storage Operations
    async fn describe_volumes(&self, filters: &[(&str, &str)]) -> Result<Vec<Volume>, CloudError>;
    async fn detach_volume(&self, volume_id: &str, instance_id: &str, force: bool) -> Result<(), CloudError>;
    async fn delete_volume(&self, volume_id: &str) -> Result<(), CloudError>;

    // Key Management Operations
    async fn describe_key_by_alias(&self, alias: &str) -> Result<EncryptionKey, CloudError>;
    async fn create_key(&self, description: &str, tags: Tags) -> Result<EncryptionKey, CloudError>;
    async fn enable_key_rotation(&self, key_id: &str) -> Result<(), CloudError>;
    async fn create_alias(&self, alias: &str, key_id: &str) -> Result<(), CloudError>;
    async fn schedule_key_deletion(&self, key_id: &str, pending_window_days: u32) -> Result<(), CloudError>;

    // Identity Operations
    async fn get_role(&self, name: &str) -> Result<Role, CloudError>;
}
