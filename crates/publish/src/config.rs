//! Network descriptors and resolved per-network configuration.

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context, Result};
use derive_more::{Deref, From};
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

/// Username used for the clustering backend when none is configured.
pub const DEFAULT_CLUSTER_USER: &str = "dshop";

/// Environment prefix layered over network config files.
pub const DEFAULT_ENV_PREFIX: &str = "DSHOP_NETWORK_";

/// Opaque handle to a network's secret configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Deref, From)]
pub struct ConfigRef(String);

impl From<&str> for ConfigRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Network label injected into the entry document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum NetworkLabel {
    Mainnet,
    Rinkeby,
    Localhost,
}

impl NetworkLabel {
    pub fn from_network_id(network_id: u64) -> Self {
        match network_id {
            1 => Self::Mainnet,
            4 => Self::Rinkeby,
            _ => Self::Localhost,
        }
    }
}

/// Which chain/environment a deployment targets, and where its storage node lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub network_id: u64,
    /// Storage node API endpoint, e.g. `http://localhost:5001`.
    pub ipfs_api: Option<String>,
    pub config: ConfigRef,
}

impl NetworkDescriptor {
    pub fn label(&self) -> NetworkLabel {
        NetworkLabel::from_network_id(self.network_id)
    }
}

/// Network configuration as stored, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawNetworkConfig {
    pub domain: Option<String>,
    pub ipfs_cluster_user: Option<String>,
    pub ipfs_cluster_password: Option<String>,
    pub pinata_key: Option<String>,
    pub pinata_secret: Option<String>,
    pub cloudflare_email: Option<String>,
    pub cloudflare_api_key: Option<String>,
    pub gcp_credentials: Option<String>,
    pub ipfs_gateway: Option<String>,
}

/// Credentials for the clustering backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterCredentials {
    pub username: String,
    pub password: String,
}

/// Credentials for the Pinata pinning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinataCredentials {
    pub api_key: String,
    pub secret_api_key: String,
}

/// The DNS provider honored for a run.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum DnsProvider {
    Cloudflare {
        email: Option<String>,
        api_key: String,
    },
    CloudDns {
        credentials: String,
    },
}

/// Validated network configuration.
///
/// At most one DNS provider survives resolution; pinning providers are independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedNetworkConfig {
    /// DNS zone the shop subdomains live under.
    pub domain: Option<String>,
    /// Only present when a password was configured.
    pub cluster: Option<ClusterCredentials>,
    /// Only present when both key and secret were configured.
    pub pinata: Option<PinataCredentials>,
    pub dns: Option<DnsProvider>,
    /// Custom gateway base URL, without trailing slash.
    pub ipfs_gateway: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ResolvedNetworkConfig {
    /// Validate a raw configuration.
    pub fn from_raw(raw: RawNetworkConfig) -> Result<Self> {
        let domain = non_empty(raw.domain);

        let cluster = non_empty(raw.ipfs_cluster_password).map(|password| ClusterCredentials {
            username: non_empty(raw.ipfs_cluster_user)
                .unwrap_or_else(|| DEFAULT_CLUSTER_USER.to_string()),
            password,
        });

        let pinata = match (non_empty(raw.pinata_key), non_empty(raw.pinata_secret)) {
            (Some(api_key), Some(secret_api_key)) => Some(PinataCredentials {
                api_key,
                secret_api_key,
            }),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("Pinata key and secret must both be set, ignoring Pinata");
                None
            }
            (None, None) => None,
        };

        let dns = if let Some(api_key) = non_empty(raw.cloudflare_api_key) {
            Some(DnsProvider::Cloudflare {
                email: non_empty(raw.cloudflare_email),
                api_key,
            })
        } else {
            non_empty(raw.gcp_credentials).map(|credentials| DnsProvider::CloudDns { credentials })
        };

        if let (Some(provider), None) = (&dns, &domain) {
            anyhow::bail!("DNS provider {provider} is configured but no domain zone is set");
        }

        let ipfs_gateway = non_empty(raw.ipfs_gateway)
            .map(|gateway| {
                Url::parse(&gateway).with_context(|| format!("Invalid ipfs_gateway: {gateway}"))?;
                Ok::<_, anyhow::Error>(gateway.trim_end_matches('/').to_string())
            })
            .transpose()?;

        Ok(Self {
            domain,
            cluster,
            pinata,
            dns,
            ipfs_gateway,
        })
    }

    /// Whether any remote pinning backend could be used for this network.
    pub fn has_pinning_backend(&self, network: &NetworkDescriptor) -> bool {
        self.pinata.is_some() || (self.cluster.is_some() && network.ipfs_api.is_some())
    }
}

/// Resolves a [`ConfigRef`] into a validated configuration.
pub trait ConfigResolver {
    fn get_config(&self, config: &ConfigRef) -> Result<ResolvedNetworkConfig>;
}

/// Resolves config references as TOML file paths, with environment overrides.
#[derive(Debug, Clone)]
pub struct FileConfigResolver {
    env_prefix: String,
}

impl Default for FileConfigResolver {
    fn default() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }
}

impl FileConfigResolver {
    pub fn with_env_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: prefix.into(),
        }
    }

    /// Prefixed environment variables keyed by lowercased field name.
    ///
    /// Values stay verbatim strings: a secret such as `007123` must not be
    /// reinterpreted as a number.
    fn env_overrides(&self) -> BTreeMap<String, String> {
        std::env::vars()
            .filter_map(|(key, value)| {
                let field = key.strip_prefix(&self.env_prefix)?;
                (!field.is_empty()).then(|| (field.to_ascii_lowercase(), value))
            })
            .collect()
    }
}

impl ConfigResolver for FileConfigResolver {
    fn get_config(&self, config: &ConfigRef) -> Result<ResolvedNetworkConfig> {
        let path = PathBuf::from(config.as_str());
        if !path.is_file() {
            anyhow::bail!("Network config file not found: {}", path.display());
        }

        let raw: RawNetworkConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Serialized::defaults(self.env_overrides()))
            .extract()
            .with_context(|| format!("Failed to load network config from {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Network configuration loaded");

        ResolvedNetworkConfig::from_raw(raw)
    }
}
