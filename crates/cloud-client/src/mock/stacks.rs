//! Stack operations for MockCloudProvider
//!
//! Mirrors the provider's lifecycle: create and update leave the stack in an
//! in-progress state until a test completes it with `complete_stack`.

use super::{CloudCall, MockCloudProvider};
use crate::error::CloudError;
use crate::models::*;

impl MockCloudProvider {
    /// Finish an in-progress stack operation, publishing the given outputs
    pub fn complete_stack(&self, name: &str, outputs: Vec<StackOutput>) {
        if let Some(stack) = self.stacks.lock().unwrap().get_mut(name) {
            stack.status = match stack.status {
                StackStatus::UpdateInProgress => StackStatus::UpdateComplete,
                StackStatus::DeleteInProgress => StackStatus::DeleteComplete,
                _ => StackStatus::CreateComplete,
            };
            stack.outputs = outputs;
        }
    }
}

pub async fn describe_stack(client: &MockCloudProvider, name: &str) -> Result<Stack, CloudError> {
    client.check_failure("describe_stack")?;
    client.stacks
        .lock()
        .unwrap()
        .get(name)
        .filter(|s| s.status != StackStatus::DeleteComplete)
        .cloned()
        .ok_or_else(|| CloudError::NotFound(format!("Stack {} not found", name)))
}

pub async fn create_stack(client: &MockCloudProvider, request: CreateStackRequest) -> Result<(), CloudError> {
    client.check_failure("create_stack")?;
    client.record(CloudCall::CreateStack(request.clone()));

    let mut stacks = client.stacks.lock().unwrap();
    if stacks.get(&request.name).is_some_and(|s| s.status != StackStatus::DeleteComplete) {
        return Err(CloudError::AlreadyExists(format!("Stack {} already exists", request.name)));
    }

    stacks.insert(
        request.name.clone(),
        Stack {
            name: request.name,
            status: StackStatus::CreateInProgress,
            outputs: Vec::new(),
            termination_protection: request.enable_termination_protection,
            last_updated: Some(chrono::Utc::now()),
        },
    );
    Ok(())
}

pub async fn update_stack(client: &MockCloudProvider, request: UpdateStackRequest) -> Result<(), CloudError> {
    client.check_failure("update_stack")?;
    client.record(CloudCall::UpdateStack(request.clone()));

    let mut stacks = client.stacks.lock().unwrap();
    let stack = stacks
        .get_mut(&request.name)
        .ok_or_else(|| CloudError::NotFound(format!("Stack {} not found", request.name)))?;

    if stack.status.is_in_progress() {
        return Err(CloudError::InProgress(format!("Stack {} is {:?}", request.name, stack.status)));
    }

    stack.status = StackStatus::UpdateInProgress;
    stack.last_updated = Some(chrono::Utc::now());
    Ok(())
}

pub async fn delete_stack(client: &MockCloudProvider, name: &str) -> Result<(), CloudError> {
    client.check_failure("delete_stack")?;
    client.record(CloudCall::DeleteStack(name.to_string()));

    let mut stacks = client.stacks.lock().unwrap();
    let stack = stacks
        .get_mut(name)
        .filter(|s| s.status != StackStatus::DeleteComplete)
        .ok_or_else(|| CloudError::NotFound(format!("Stack {} not found", name)))?;

    if stack.status == StackStatus::DeleteInProgress {
        return Err(CloudError::InProgress(format!("Stack {} is already being deleted", name)));
    }
    if stack.termination_protection {
        return Err(CloudError::Api(format!("Stack {} has termination protection enabled", name)));
    }

    stack.status = StackStatus::DeleteInProgress;
    Ok(())
}

pub async fn set_termination_protection(client: &MockCloudProvider, name: &str, enabled: bool) -> Result<(), CloudError> {
    client.check_failure("set_termination_protection")?;
    client.record(CloudCall::SetTerminationProtection(name.to_string(), enabled));

    let mut stacks = client.stacks.lock().unwrap();
    let stack = stacks
        .get_mut(name)
        .ok_or_else(|| CloudError::NotFound(format!("Stack {} not found", name)))?;
    stack.termination_protection = enabled;
    Ok(())
}
