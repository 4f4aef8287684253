//! Key management and identity operations for MockCloudProvider

use super::{CloudCall, MockCloudProvider};
use crate::error::CloudError;
use crate::models::*;

pub async fn describe_key_by_alias(client: &MockCloudProvider, alias: &str) -> Result<EncryptionKey, CloudError> {
    client.check_failure("describe_key_by_alias")?;
    client
        .key_for_alias(alias)
        .ok_or_else(|| CloudError::NotFound(format!("Alias {} not found", alias)))
}

pub async fn create_key(client: &MockCloudProvider, description: &str, _tags: Tags) -> Result<EncryptionKey, CloudError> {
    client.check_failure("create_key")?;
    client.record(CloudCall::CreateKey(description.to_string()));

    let key_id = client.next_id("key");
    let key = EncryptionKey {
        arn: format!("arn:mock:kms:key/{}", key_id),
        key_id: key_id.clone(),
        state: KeyState::Enabled,
    };
    client.keys.lock().unwrap().insert(key_id, key.clone());
    Ok(key)
}

pub async fn enable_key_rotation(client: &MockCloudProvider, key_id: &str) -> Result<(), CloudError> {
    client.check_failure("enable_key_rotation")?;
    client.record(CloudCall::EnableKeyRotation(key_id.to_string()));
    if client.keys.lock().unwrap().contains_key(key_id) {
        Ok(())
    } else {
        Err(CloudError::NotFound(format!("Key {} not found", key_id)))
    }
}

pub async fn create_alias(client: &MockCloudProvider, alias: &str, key_id: &str) -> Result<(), CloudError> {
    client.check_failure("create_alias")?;
    client.record(CloudCall::CreateAlias(alias.to_string(), key_id.to_string()));

    let mut aliases = client.aliases.lock().unwrap();
    if aliases.contains_key(alias) {
        return Err(CloudError::AlreadyExists(format!("Alias {} already exists", alias)));
    }
    aliases.insert(alias.to_string(), key_id.to_string());
    Ok(())
}

pub async fn schedule_key_deletion(client: &MockCloudProvider, key_id: &str, pending_window_days: u32) -> Result<(), CloudError> {
    client.check_failure("schedule_key_deletion")?;
    client.record(CloudCall::ScheduleKeyDeletion(key_id.to_string(), pending_window_days));

    let mut keys = client.keys.lock().unwrap();
    let key = keys
        .get_mut(key_id)
        .ok_or_else(|| CloudError::NotFound(format!("Key {} not found", key_id)))?;
    key.state = KeyState::PendingDeletion;
    drop(keys);

    client.aliases.lock().unwrap().retain(|_, v| v != key_id);
    Ok(())
}

pub async fn get_role(client: &MockCloudProvider, name: &str) -> Result<Role, CloudError> {
    client.check_failure("get_role")?;
    client.roles
        .lock()
        .unwrap()
        .get(name)
        .cloned()
        .ok_or_else(|| CloudError::NotFound(format!("Role {} not found", name)))
}
