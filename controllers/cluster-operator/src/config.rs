//! Operator configuration loaded from environment variables.
//!
//! Loading fails at startup with `ControllerError::InvalidConfig`; nothing
//! here is re-read during reconciliation.

use crate::error::ControllerError;
use ipnet::Ipv4Net;
use std::time::Duration;

/// Tag carrying the installation name on provider resources
pub const INSTALLATION_TAG: &str = "tenantstack.io/installation";
/// Tag carrying the tenant cluster id on provider resources
pub const CLUSTER_TAG: &str = "tenantstack.io/cluster";
/// Tag carrying a resource's logical name inside its stack
pub const LOGICAL_ID_TAG: &str = "tenantstack.io/logical-id";

const DEFAULT_CLOUD_API_URL: &str = "http://cloud-gateway.infra:8080";
const DEFAULT_SUBNET_PREFIX: u8 = 24;
const DEFAULT_RESYNC_PERIOD_SECS: u64 = 300;

/// Which backend holds the per-cluster encryption key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncrypterConfig {
    /// Provider key-management service
    Kms,
    /// Vault transit engine
    Vault {
        /// Vault address, e.g. `https://vault.infra:8200`
        address: String,
        /// Vault token
        token: String,
    },
}

/// Operator configuration
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub cloud_api_url: String,
    pub cloud_api_token: String,
    /// Namespace to watch; all namespaces when unset
    pub namespace: Option<String>,
    pub installation: String,
    /// Pool all tenant cluster networks are carved from
    pub network_pool: Ipv4Net,
    /// Prefix length of each tenant cluster network
    pub subnet_prefix: u8,
    pub host_peer_role_name: String,
    pub encrypter: EncrypterConfig,
    pub resync_period: Duration,
}

impl OperatorConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).filter(|v| !v.is_empty()).ok_or_else(|| {
                ControllerError::InvalidConfig(format!("{} environment variable is required", key))
            })
        };

        let cloud_api_url = lookup("CLOUD_API_URL").unwrap_or_else(|| DEFAULT_CLOUD_API_URL.to_string());
        let cloud_api_token = required("CLOUD_API_TOKEN")?;
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());
        let installation = required("INSTALLATION_NAME")?;

        let pool_raw = required("NETWORK_POOL_CIDR")?;
        let network_pool: Ipv4Net = pool_raw.parse().map_err(|e| {
            ControllerError::InvalidConfig(format!("NETWORK_POOL_CIDR {:?} is not a valid IPv4 CIDR: {}", pool_raw, e))
        })?;
        let network_pool = network_pool.trunc();

        let subnet_prefix = match lookup("TENANT_SUBNET_PREFIX") {
            Some(raw) => raw.parse::<u8>().map_err(|e| {
                ControllerError::InvalidConfig(format!("TENANT_SUBNET_PREFIX {:?} is not a prefix length: {}", raw, e))
            })?,
            None => DEFAULT_SUBNET_PREFIX,
        };
        if subnet_prefix < network_pool.prefix_len() || subnet_prefix > 32 {
            return Err(ControllerError::InvalidConfig(format!(
                "TENANT_SUBNET_PREFIX /{} does not fit inside pool {}",
                subnet_prefix, network_pool
            )));
        }

        let host_peer_role_name = lookup("HOST_PEER_ROLE_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("{}-vpc-peer-access", installation));

        let encrypter = match lookup("ENCRYPTER_BACKEND").as_deref() {
            None | Some("") | Some("kms") => EncrypterConfig::Kms,
            Some("vault") => EncrypterConfig::Vault {
                address: required("VAULT_ADDR")?,
                token: required("VAULT_TOKEN")?,
            },
            Some(other) => {
                return Err(ControllerError::InvalidConfig(format!(
                    "ENCRYPTER_BACKEND must be \"kms\" or \"vault\", got {:?}",
                    other
                )));
            }
        };

        let resync_period = match lookup("RESYNC_PERIOD_SECS") {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|e| {
                ControllerError::InvalidConfig(format!("RESYNC_PERIOD_SECS {:?} is not a number: {}", raw, e))
            })?),
            None => Duration::from_secs(DEFAULT_RESYNC_PERIOD_SECS),
        };

        Ok(Self {
            cloud_api_url,
            cloud_api_token,
            namespace,
            installation,
            network_pool,
            subnet_prefix,
            host_peer_role_name,
            encrypter,
            resync_period,
        })
    }
}
