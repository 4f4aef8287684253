//! Cloud gateway API client
//!
//! Implements the provider operations the operator consumes over the
//! gateway's JSON REST API (`/v1/...`).

use crate::common::HttpClient;
use crate::error::CloudError;
use crate::models::*;
use crate::provider_trait::CloudProvider;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Cloud gateway API client
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: HttpClient,
}

impl CloudClient {
    /// Create a new cloud client
    ///
    /// # Arguments
    /// * `base_url` - Gateway base URL (e.g., "http://cloud-gateway.infra:8080")
    /// * `token` - API token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, CloudError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
        })
    }
}

#[async_trait::async_trait]
impl CloudProvider for CloudClient {
    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    async fn validate_token(&self) -> Result<(), CloudError> {
        debug!("Validating cloud gateway token and connectivity");
        let _: serde_json::Value = self.http.get("/v1/identity", &[]).await?;
        debug!("Token validated successfully");
        Ok(())
    }

    async fn describe_vpcs(&self, filters: &[(&str, &str)]) -> Result<Vec<Vpc>, CloudError> {
        self.http.get("/v1/networks", filters).await
    }

    async fn describe_vpc_peering_connections(&self, filters: &[(&str, &str)]) -> Result<Vec<VpcPeeringConnection>, CloudError> {
        self.http.get("/v1/vpc-peering-connections", filters).await
    }

    async fn describe_stack(&self, name: &str) -> Result<Stack, CloudError> {
        self.http.get(&format!("/v1/stacks/{}", name), &[]).await
    }

    async fn create_stack(&self, request: CreateStackRequest) -> Result<(), CloudError> {
        self.http.post("/v1/stacks", &serde_json::to_value(&request)?).await
    }

    async fn update_stack(&self, request: UpdateStackRequest) -> Result<(), CloudError> {
        let path = format!("/v1/stacks/{}", request.name);
        self.http.put(&path, &serde_json::to_value(&request)?).await
    }

    async fn delete_stack(&self, name: &str) -> Result<(), CloudError> {
        self.http.delete(&format!("/v1/stacks/{}", name)).await
    }

    async fn set_termination_protection(&self, name: &str, enabled: bool) -> Result<(), CloudError> {
        let path = format!("/v1/stacks/{}/termination-protection", name);
        self.http.put(&path, &json!({ "enabled": enabled })).await
    }

    async fn describe_instances(&self, filters: &[(&str, &str)]) -> Result<Vec<Instance>, CloudError> {
        self.http.get("/v1/instances", filters).await
    }

    async fn stop_instance(&self, id: &str) -> Result<(), CloudError> {
        self.http.post(&format!("/v1/instances/{}/stop", id), &json!({})).await
    }

    async fn terminate_instance(&self, id: &str) -> Result<(), CloudError> {
        self.http.post(&format!("/v1/instances/{}/terminate", id), &json!({})).await
    }

    async fn describe_auto_scaling_group(&self, name: &str) -> Result<AutoScalingGroup, CloudError> {
        self.http.get(&format!("/v1/autoscaling-groups/{}", name), &[]).await
    }

    async fn describe_volumes(&self, filters: &[(&str, &str)]) -> Result<Vec<Volume>, CloudError> {
        self.http.get("/v1/volumes", filters).await
    }

    async fn detach_volume(&self, volume_id: &str, instance_id: &str, force: bool) -> Result<(), CloudError> {
        let body = json!({ "instanceId": instance_id, "force": force });
        self.http.post(&format!("/v1/volumes/{}/detach", volume_id), &body).await
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<(), CloudError> {
        self.http.delete(&format!("/v1/volumes/{}", volume_id)).await
    }

    async fn describe_key_by_alias(&self, alias: &str) -> Result<EncryptionKey, CloudError> {
        self.http.get("/v1/keys/by-alias", &[("alias", alias)]).await
    }

    async fn create_key(&self, description: &str, tags: Tags) -> Result<EncryptionKey, CloudError> {
        let body = json!({ "description": description, "tags": tags });
        self.http.post_json("/v1/keys", &body).await
    }

    async fn enable_key_rotation(&self, key_id: &str) -> Result<(), CloudError> {
        self.http.post(&format!("/v1/keys/{}/rotation", key_id), &json!({ "enabled": true })).await
    }

    async fn create_alias(&self, alias: &str, key_id: &str) -> Result<(), CloudError> {
        self.http.post("/v1/keys/aliases", &json!({ "alias": alias, "keyId": key_id })).await
    }

    async fn schedule_key_deletion(&self, key_id: &str, pending_window_days: u32) -> Result<(), CloudError> {
        let body = json!({ "pendingWindowDays": pending_window_days });
        self.http.post(&format!("/v1/keys/{}/schedule-deletion", key_id), &body).await
    }

    async fn get_role(&self, name: &str) -> Result<Role, CloudError> {
        self.http.get(&format!("/v1/roles/{}", name), &[]).await
    }
}
