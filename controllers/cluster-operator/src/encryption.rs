//! Per-cluster encryption key.
//!
//! The backend is chosen once from configuration. `Kms` uses the provider's
//! key-management service through the cloud client; `Vault` talks to a Vault
//! transit engine over HTTP.

use crate::config::{EncrypterConfig, CLUSTER_TAG, INSTALLATION_TAG};
use crate::context::TickContext;
use crate::error::ControllerError;
use crate::resource::{Flow, Resource};
use cloud_client::{CloudProvider, Tags};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Days a scheduled key deletion can still be cancelled
const KEY_DELETION_WINDOW_DAYS: u32 = 7;

/// Key-management-service backend
pub struct KmsEncrypter {
    cloud: Arc<dyn CloudProvider>,
    installation: String,
}

impl std::fmt::Debug for KmsEncrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmsEncrypter")
            .field("installation", &self.installation)
            .finish_non_exhaustive()
    }
}

impl KmsEncrypter {
    pub fn new(cloud: Arc<dyn CloudProvider>, installation: String) -> Self {
        Self { cloud, installation }
    }

    pub fn alias(&self, cluster_id: &str) -> String {
        format!("alias/{}/{}", self.installation, cluster_id)
    }

    async fn ensure_key(&self, cluster_id: &str) -> Result<String, ControllerError> {
        let alias = self.alias(cluster_id);
        match self.cloud.describe_key_by_alias(&alias).await {
            Ok(key) => {
                // Idempotent; an earlier tick may have failed after binding the alias.
                self.cloud.enable_key_rotation(&key.key_id).await?;
                return Ok(key.arn);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let mut tags = Tags::new();
        tags.insert(INSTALLATION_TAG.to_string(), self.installation.clone());
        tags.insert(CLUSTER_TAG.to_string(), cluster_id.to_string());

        let key = self
            .cloud
            .create_key(&format!("Encryption key for tenant cluster {}", cluster_id), tags)
            .await?;

        // Later ticks find the key only through its alias.
        let bound = match self.cloud.create_alias(&alias, &key.key_id).await {
            Ok(()) => {
                info!("Created encryption key {} with alias {}", key.key_id, alias);
                key
            }
            Err(e) if e.is_already_exists() => {
                self.discard_key(&key.key_id).await;
                self.cloud.describe_key_by_alias(&alias).await?
            }
            Err(e) => {
                self.discard_key(&key.key_id).await;
                return Err(e.into());
            }
        };

        self.cloud.enable_key_rotation(&bound.key_id).await?;
        Ok(bound.arn)
    }

    /// Schedule deletion of a key that never got bound to the alias.
    async fn discard_key(&self, key_id: &str) {
        match self.cloud.schedule_key_deletion(key_id, KEY_DELETION_WINDOW_DAYS).await {
            Ok(()) => debug!("Scheduled deletion of unbound encryption key {}", key_id),
            Err(e) => warn!("Failed to schedule deletion of unbound encryption key {}: {}", key_id, e),
        }
    }

    async fn delete_key(&self, cluster_id: &str) -> Result<(), ControllerError> {
        let alias = self.alias(cluster_id);
        let key = match self.cloud.describe_key_by_alias(&alias).await {
            Ok(key) => key,
            Err(e) if e.is_not_found() => {
                debug!("Encryption key alias {} is already gone", alias);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match self.cloud.schedule_key_deletion(&key.key_id, KEY_DELETION_WINDOW_DAYS).await {
            Ok(()) => {
                info!("Scheduled deletion of encryption key {} ({})", key.key_id, alias);
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Vault transit backend
#[derive(Debug, Clone)]
pub struct VaultEncrypter {
    client: reqwest::Client,
    address: String,
    token: String,
}

impl VaultEncrypter {
    pub fn new(address: String, token: String) -> Result<Self, ControllerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ControllerError::Encryption(format!("failed to build Vault client: {}", e)))?;

        Ok(Self {
            client,
            address: address.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn key_url(&self, cluster_id: &str) -> String {
        format!("{}/v1/transit/keys/{}", self.address, cluster_id)
    }

    async fn send(&self, request: reqwest::RequestBuilder, action: &str) -> Result<StatusCode, ControllerError> {
        let response = request
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .map_err(|e| ControllerError::Encryption(format!("{}: {}", action, e)))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(status);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ControllerError::Encryption(format!("{}: Vault returned {}: {}", action, status, body)))
    }

    async fn ensure_key(&self, cluster_id: &str) -> Result<String, ControllerError> {
        let action = format!("create transit key {}", cluster_id);
        let status = self
            .send(self.client.post(self.key_url(cluster_id)).json(&serde_json::json!({})), &action)
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Err(ControllerError::Encryption(format!("{}: transit engine is not mounted", action)));
        }
        Ok(format!("transit/{}", cluster_id))
    }

    async fn delete_key(&self, cluster_id: &str) -> Result<(), ControllerError> {
        let config_url = format!("{}/config", self.key_url(cluster_id));
        let action = format!("allow deletion of transit key {}", cluster_id);
        let status = self
            .send(
                self.client
                    .post(config_url)
                    .json(&serde_json::json!({ "deletion_allowed": true })),
                &action,
            )
            .await?;
        if status == StatusCode::NOT_FOUND {
            debug!("Transit key {} is already gone", cluster_id);
            return Ok(());
        }

        let action = format!("delete transit key {}", cluster_id);
        self.send(self.client.delete(self.key_url(cluster_id)), &action).await?;
        info!("Deleted transit key {}", cluster_id);
        Ok(())
    }
}

/// The two supported key backends
#[derive(Debug)]
pub enum EncryptionBackend {
    Kms(KmsEncrypter),
    Vault(VaultEncrypter),
}

impl EncryptionBackend {
    /// Build the backend selected by configuration.
    pub fn from_config(
        config: &EncrypterConfig,
        cloud: Arc<dyn CloudProvider>,
        installation: &str,
    ) -> Result<Self, ControllerError> {
        Ok(match config {
            EncrypterConfig::Kms => EncryptionBackend::Kms(KmsEncrypter::new(cloud, installation.to_string())),
            EncrypterConfig::Vault { address, token } => {
                EncryptionBackend::Vault(VaultEncrypter::new(address.clone(), token.clone())?)
            }
        })
    }

    /// Make sure the cluster's key exists and return its identifier.
    pub async fn ensure_key(&self, cluster_id: &str) -> Result<String, ControllerError> {
        match self {
            EncryptionBackend::Kms(kms) => kms.ensure_key(cluster_id).await,
            EncryptionBackend::Vault(vault) => vault.ensure_key(cluster_id).await,
        }
    }

    /// Remove the cluster's key. Absent keys count as removed.
    pub async fn delete_key(&self, cluster_id: &str) -> Result<(), ControllerError> {
        match self {
            EncryptionBackend::Kms(kms) => kms.delete_key(cluster_id).await,
            EncryptionBackend::Vault(vault) => vault.delete_key(cluster_id).await,
        }
    }
}

/// Encryption key step
#[derive(Debug)]
pub struct EncryptionResource {
    backend: EncryptionBackend,
}

impl EncryptionResource {
    pub fn new(backend: EncryptionBackend) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl Resource for EncryptionResource {
    fn name(&self) -> &str {
        "encryption"
    }

    async fn ensure_created(&self, ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        let key = self.backend.ensure_key(ctx.cluster_id()).await?;
        ctx.encryption_key = Some(key);
        Ok(Flow::Continue)
    }

    async fn ensure_deleted(&self, ctx: &mut TickContext) -> Result<Flow, ControllerError> {
        self.backend.delete_key(ctx.cluster_id()).await?;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TEST_CLUSTER_ID;
    use cloud_client::{CloudCall, MockCloudProvider};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn kms(cloud: &Arc<MockCloudProvider>) -> EncryptionBackend {
        EncryptionBackend::Kms(KmsEncrypter::new(cloud.clone(), "gauss".to_string()))
    }

    #[tokio::test]
    async fn test_kms_creates_key_once() {
        let cloud = Arc::new(MockCloudProvider::new());
        let backend = kms(&cloud);

        let first = backend.ensure_key(TEST_CLUSTER_ID).await.unwrap();
        let second = backend.ensure_key(TEST_CLUSTER_ID).await.unwrap();
        assert_eq!(first, second);

        let creates = cloud.calls_matching(|c| matches!(c, CloudCall::CreateKey(_)));
        assert_eq!(creates.len(), 1);
        let rotations = cloud.calls_matching(|c| matches!(c, CloudCall::EnableKeyRotation(_)));
        assert_eq!(rotations.len(), 2);
        assert!(cloud.key_for_alias(&format!("alias/gauss/{}", TEST_CLUSTER_ID)).is_some());
    }

    #[tokio::test]
    async fn test_kms_delete_schedules_deletion() {
        let cloud = Arc::new(MockCloudProvider::new());
        let backend = kms(&cloud);
        backend.ensure_key(TEST_CLUSTER_ID).await.unwrap();
        let key_id = cloud
            .key_for_alias(&format!("alias/gauss/{}", TEST_CLUSTER_ID))
            .unwrap()
            .key_id;

        backend.delete_key(TEST_CLUSTER_ID).await.unwrap();

        assert!(cloud
            .calls()
            .contains(&CloudCall::ScheduleKeyDeletion(key_id.clone(), KEY_DELETION_WINDOW_DAYS)));
        assert!(cloud.key_for_alias(&format!("alias/gauss/{}", TEST_CLUSTER_ID)).is_none());
    }

    #[tokio::test]
    async fn test_kms_rotation_failure_does_not_leak_key() {
        let cloud = Arc::new(MockCloudProvider::new());
        let backend = kms(&cloud);

        cloud.fail_operation("enable_key_rotation", "throttled");
        backend.ensure_key(TEST_CLUSTER_ID).await.unwrap_err();
        cloud.clear_failure("enable_key_rotation");

        let arn = backend.ensure_key(TEST_CLUSTER_ID).await.unwrap();
        assert_eq!(cloud.calls_matching(|c| matches!(c, CloudCall::CreateKey(_))).len(), 1);
        let key = cloud.key_for_alias(&format!("alias/gauss/{}", TEST_CLUSTER_ID)).unwrap();
        assert_eq!(key.arn, arn);

        backend.delete_key(TEST_CLUSTER_ID).await.unwrap();
        assert_eq!(
            cloud.calls_matching(|c| matches!(c, CloudCall::ScheduleKeyDeletion(..))),
            vec![CloudCall::ScheduleKeyDeletion(key.key_id, KEY_DELETION_WINDOW_DAYS)]
        );
    }

    #[tokio::test]
    async fn test_kms_alias_failure_discards_new_key() {
        let cloud = Arc::new(MockCloudProvider::new());
        let backend = kms(&cloud);

        cloud.fail_operation("create_alias", "alias quota exceeded");
        backend.ensure_key(TEST_CLUSTER_ID).await.unwrap_err();
        let created = cloud.calls_matching(|c| matches!(c, CloudCall::CreateKey(_)));
        assert_eq!(created.len(), 1);
        assert_eq!(
            cloud.calls_matching(|c| matches!(c, CloudCall::ScheduleKeyDeletion(..))),
            vec![CloudCall::ScheduleKeyDeletion("key-00000001".to_string(), KEY_DELETION_WINDOW_DAYS)]
        );
        assert!(cloud.calls_matching(|c| matches!(c, CloudCall::EnableKeyRotation(_))).is_empty());

        cloud.clear_failure("create_alias");
        let arn = backend.ensure_key(TEST_CLUSTER_ID).await.unwrap();
        assert_eq!(arn, "arn:mock:kms:key/key-00000002");
    }

    #[tokio::test]
    async fn test_kms_delete_missing_key_succeeds() {
        let cloud = Arc::new(MockCloudProvider::new());
        kms(&cloud).delete_key(TEST_CLUSTER_ID).await.unwrap();
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_vault_creates_transit_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/transit/keys/{}", TEST_CLUSTER_ID)))
            .and(header("X-Vault-Token", "root"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let backend = EncryptionBackend::Vault(VaultEncrypter::new(server.uri(), "root".to_string()).unwrap());
        let key = backend.ensure_key(TEST_CLUSTER_ID).await.unwrap();
        assert_eq!(key, format!("transit/{}", TEST_CLUSTER_ID));
    }

    #[tokio::test]
    async fn test_vault_delete_missing_key_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/transit/keys/{}/config", TEST_CLUSTER_ID)))
            .and(body_json(serde_json::json!({ "deletion_allowed": true })))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let backend = EncryptionBackend::Vault(VaultEncrypter::new(server.uri(), "root".to_string()).unwrap());
        backend.delete_key(TEST_CLUSTER_ID).await.unwrap();
    }

    #[tokio::test]
    async fn test_vault_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let backend = EncryptionBackend::Vault(VaultEncrypter::new(server.uri(), "bad".to_string()).unwrap());
        let err = backend.ensure_key(TEST_CLUSTER_ID).await.unwrap_err();
        assert!(matches!(err, ControllerError::Encryption(msg) if msg.contains("403")));
    }
}
