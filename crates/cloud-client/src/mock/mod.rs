//! Mock CloudProvider for unit testing
//!
//! This module provides an in-memory implementation of CloudProvider that can
//! be used in unit tests without a running gateway. Every mutating call is
//! recorded so tests can assert on what the operator asked the provider to do.
//!
//! The mock is organized into domain-specific modules:
//! - `stacks.rs` - Stack lifecycle operations
//! - `compute.rs` - Instances, volumes, autoscaling groups
//! - `identity.rs` - Key management and identity roles

mod compute;
mod identity;
mod stacks;

use crate::error::CloudError;
use crate::models::*;
use crate::provider_trait::CloudProvider;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A mutating call received by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum CloudCall {
    CreateStack(CreateStackRequest),
    UpdateStack(UpdateStackRequest),
    DeleteStack(String),
    SetTerminationProtection(String, bool),
    StopInstance(String),
    TerminateInstance(String),
    DetachVolume { volume_id: String, instance_id: String, force: bool },
    DeleteVolume(String),
    CreateKey(String),
    EnableKeyRotation(String),
    CreateAlias(String, String),
    ScheduleKeyDeletion(String, u32),
}

/// Error a configured operation fails with
#[derive(Debug, Clone)]
pub(crate) enum Failure {
    Api(String),
    InProgress(String),
}

/// Mock CloudProvider for testing
///
/// Resources are stored in memory. Individual operations can be configured
/// to fail with `fail_operation` or `busy_operation` to exercise error paths.
#[derive(Clone, Default)]
pub struct MockCloudProvider {
    pub(crate) vpcs: Arc<Mutex<Vec<Vpc>>>,
    pub(crate) peerings: Arc<Mutex<Vec<VpcPeeringConnection>>>,
    pub(crate) stacks: Arc<Mutex<HashMap<String, Stack>>>,
    pub(crate) instances: Arc<Mutex<HashMap<String, Instance>>>,
    pub(crate) volumes: Arc<Mutex<HashMap<String, Volume>>>,
    pub(crate) asgs: Arc<Mutex<HashMap<String, AutoScalingGroup>>>,
    pub(crate) keys: Arc<Mutex<HashMap<String, EncryptionKey>>>,
    pub(crate) aliases: Arc<Mutex<HashMap<String, String>>>,
    pub(crate) roles: Arc<Mutex<HashMap<String, Role>>>,
    pub(crate) failures: Arc<Mutex<HashMap<String, Failure>>>,
    pub(crate) calls: Arc<Mutex<Vec<CloudCall>>>,
    pub(crate) next_id: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for MockCloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCloudProvider").finish_non_exhaustive()
    }
}

impl MockCloudProvider {
    /// Create a new, empty mock provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a VPC (for test setup)
    pub fn add_vpc(&self, vpc: Vpc) {
        self.vpcs.lock().unwrap().push(vpc);
    }

    /// Add a VPC peering connection (for test setup)
    pub fn add_peering(&self, peering: VpcPeeringConnection) {
        self.peerings.lock().unwrap().push(peering);
    }

    /// Add a stack (for test setup)
    pub fn add_stack(&self, stack: Stack) {
        self.stacks.lock().unwrap().insert(stack.name.clone(), stack);
    }

    /// Add an instance (for test setup)
    pub fn add_instance(&self, instance: Instance) {
        self.instances.lock().unwrap().insert(instance.id.clone(), instance);
    }

    /// Add a volume (for test setup)
    pub fn add_volume(&self, volume: Volume) {
        self.volumes.lock().unwrap().insert(volume.id.clone(), volume);
    }

    /// Add an autoscaling group (for test setup)
    pub fn add_auto_scaling_group(&self, asg: AutoScalingGroup) {
        self.asgs.lock().unwrap().insert(asg.name.clone(), asg);
    }

    /// Add an identity role (for test setup)
    pub fn add_role(&self, role: Role) {
        self.roles.lock().unwrap().insert(role.name.clone(), role);
    }

    /// Make every call of `operation` fail with an API error until cleared
    pub fn fail_operation(&self, operation: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), Failure::Api(message.to_string()));
    }

    /// Make every call of `operation` report that another operation is underway until cleared
    pub fn busy_operation(&self, operation: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), Failure::InProgress(message.to_string()));
    }

    /// Clear a configured failure
    pub fn clear_failure(&self, operation: &str) {
        self.failures.lock().unwrap().remove(operation);
    }

    /// Current state of a stack
    pub fn stack(&self, name: &str) -> Option<Stack> {
        self.stacks.lock().unwrap().get(name).cloned()
    }

    /// Current state of an instance
    pub fn instance(&self, id: &str) -> Option<Instance> {
        self.instances.lock().unwrap().get(id).cloned()
    }

    /// Current state of a volume
    pub fn volume(&self, id: &str) -> Option<Volume> {
        self.volumes.lock().unwrap().get(id).cloned()
    }

    /// Key currently bound to an alias
    pub fn key_for_alias(&self, alias: &str) -> Option<EncryptionKey> {
        let key_id = self.aliases.lock().unwrap().get(alias).cloned()?;
        self.keys.lock().unwrap().get(&key_id).cloned()
    }

    /// All mutating calls received so far
    pub fn calls(&self) -> Vec<CloudCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Mutating calls matching a predicate
    pub fn calls_matching(&self, predicate: impl Fn(&CloudCall) -> bool) -> Vec<CloudCall> {
        self.calls().into_iter().filter(|c| predicate(c)).collect()
    }

    pub(crate) fn record(&self, call: CloudCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub(crate) fn check_failure(&self, operation: &str) -> Result<(), CloudError> {
        match self.failures.lock().unwrap().get(operation) {
            Some(Failure::Api(message)) => Err(CloudError::Api(message.clone())),
            Some(Failure::InProgress(message)) => Err(CloudError::InProgress(message.clone())),
            None => Ok(()),
        }
    }

    pub(crate) fn next_id(&self, prefix: &str) -> String {
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        format!("{}-{:08x}", prefix, *id)
    }
}

fn matches_filters(tags: &Tags, filters: &[(&str, &str)]) -> bool {
    filters
        .iter()
        .all(|(k, v)| tags.get(*k).map(String::as_str) == Some(*v))
}

#[async_trait::async_trait]
impl CloudProvider for MockCloudProvider {
    fn base_url(&self) -> &str {
        "http://mock-cloud"
    }

    async fn validate_token(&self) -> Result<(), CloudError> {
        Ok(())
    }

    async fn describe_vpcs(&self, filters: &[(&str, &str)]) -> Result<Vec<Vpc>, CloudError> {
        self.check_failure("describe_vpcs")?;
        Ok(self
            .vpcs
            .lock()
            .unwrap()
            .iter()
            .filter(|v| matches_filters(&v.tags, filters))
            .cloned()
            .collect())
    }

    async fn describe_vpc_peering_connections(&self, filters: &[(&str, &str)]) -> Result<Vec<VpcPeeringConnection>, CloudError> {
        self.check_failure("describe_vpc_peering_connections")?;
        Ok(self
            .peerings
            .lock()
            .unwrap()
            .iter()
            .filter(|p| matches_filters(&p.tags, filters))
            .cloned()
            .collect())
    }

    // Stack Operations - delegated to stacks module
    async fn describe_stack(&self, name: &str) -> Result<Stack, CloudError> {
        stacks::describe_stack(self, name).await
    }

    async fn create_stack(&self, request: CreateStackRequest) -> Result<(), CloudError> {
        stacks::create_stack(self, request).await
    }

    async fn update_stack(&self, request: UpdateStackRequest) -> Result<(), CloudError> {
        stacks::update_stack(self, request).await
    }

    async fn delete_stack(&self, name: &str) -> Result<(), CloudError> {
        stacks::delete_stack(self, name).await
    }

    async fn set_termination_protection(&self, name: &str, enabled: bool) -> Result<(), CloudError> {
        stacks::set_termination_protection(self, name, enabled).await
    }

    // Compute Operations - delegated to compute module
    async fn describe_instances(&self, filters: &[(&str, &str)]) -> Result<Vec<Instance>, CloudError> {
        compute::describe_instances(self, filters).await
    }

    async fn stop_instance(&self, id: &str) -> Result<(), CloudError> {
        compute::stop_instance(self, id).await
    }

    async fn terminate_instance(&self, id: &str) -> Result<(), CloudError> {
        compute::terminate_instance(self, id).await
    }

    async fn describe_auto_scaling_group(&self, name: &str) -> Result<AutoScalingGroup, CloudError> {
        compute::describe_auto_scaling_group(self, name).await
    }

    async fn describe_volumes(&self, filters: &[(&str, &str)]) -> Result<Vec<Volume>, CloudError> {
        compute::describe_volumes(self, filters).await
    }

    async fn detach_volume(&self, volume_id: &str, instance_id: &str, force: bool) -> Result<(), CloudError> {
        compute::detach_volume(self, volume_id, instance_id, force).await
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<(), CloudError> {
        compute::delete_volume(self, volume_id).await
    }

    // Key Management / Identity Operations - delegated to identity module
    async fn describe_key_by_alias(&self, alias: &str) -> Result<EncryptionKey, CloudError> {
        identity::describe_key_by_alias(self, alias).await
    }

    async fn create_key(&self, description: &str, tags: Tags) -> Result<EncryptionKey, CloudError> {
        identity::create_key(self, description, tags).await
    }

    async fn enable_key_rotation(&self, key_id: &str) -> Result<(), CloudError> {
        identity::enable_key_rotation(self, key_id).await
    }

    async fn create_alias(&self, alias: &str, key_id: &str) -> Result<(), CloudError> {
        identity::create_alias(self, alias, key_id).await
    }

    async fn schedule_key_deletion(&self, key_id: &str, pending_window_days: u32) -> Result<(), CloudError> {
        identity::schedule_key_deletion(self, key_id, pending_window_days).await
    }

    async fn get_role(&self, name: &str) -> Result<Role, CloudError> {
        identity::get_role(self, name).await
    }
}
