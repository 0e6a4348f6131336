//! Uploading the staged directory to content-addressed storage.
//!
//! Each service is in its own submodule:
//! - `ipfs_deploy` - aggregated upload to remote pinning backends
//! - `kubo` - direct upload to a local node's HTTP API

mod ipfs_deploy;
mod kubo;

use std::{future::Future, path::Path};

use anyhow::Result;

pub use ipfs_deploy::{IpfsDeployCmdBuilder, IpfsDeployPublisher};
pub use kubo::KuboClient;

use crate::{
    AddressError, DeployError, NetworkDescriptor, ResolvedNetworkConfig, Stage,
    address::url_to_peer_address,
};

/// Gateway reported for content uploaded through remote pinning backends.
pub const PINATA_GATEWAY: &str = "https://gateway.pinata.cloud";

/// Substring that marks a storage endpoint as a local development node.
pub const LOCAL_NODE_MARKER: &str = "localhost";

/// A remote backend that retains uploaded content.
#[derive(Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum PinningBackend {
    /// A clustering node, addressed by peer address.
    IpfsCluster {
        host: String,
        username: String,
        password: String,
    },
    /// The Pinata pinning service.
    Pinata {
        api_key: String,
        secret_api_key: String,
    },
}

impl PinningBackend {
    /// Name understood by the aggregating publisher.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// How the staged directory gets published, selected once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStrategy {
    /// Upload to every listed backend through the aggregating publisher.
    Aggregated { backends: Vec<PinningBackend> },
    /// Add the directory straight to a local node.
    LocalNode { api_url: String },
    /// Nothing configured and not a development node.
    Skipped,
}

impl PublishStrategy {
    /// Pick the strategy for a network.
    ///
    /// Remote backends win over a local node; the clustering backend is listed
    /// before Pinata.
    pub fn select(
        network: &NetworkDescriptor,
        config: &ResolvedNetworkConfig,
    ) -> Result<Self, AddressError> {
        let mut backends = Vec::new();

        if let (Some(api), Some(cluster)) = (&network.ipfs_api, &config.cluster) {
            let host = url_to_peer_address(api)?;
            tracing::info!(host = %host, "Connecting to cluster");
            backends.push(PinningBackend::IpfsCluster {
                host,
                username: cluster.username.clone(),
                password: cluster.password.clone(),
            });
        }

        if let Some(pinata) = &config.pinata {
            backends.push(PinningBackend::Pinata {
                api_key: pinata.api_key.clone(),
                secret_api_key: pinata.secret_api_key.clone(),
            });
        }

        if !backends.is_empty() {
            return Ok(Self::Aggregated { backends });
        }

        match &network.ipfs_api {
            Some(api) if api.contains(LOCAL_NODE_MARKER) => Ok(Self::LocalNode {
                api_url: api.clone(),
            }),
            _ => Ok(Self::Skipped),
        }
    }

    pub fn uses_backend(&self, name: &str) -> bool {
        match self {
            Self::Aggregated { backends } => backends.iter().any(|b| b.name() == name),
            _ => false,
        }
    }
}

/// Outcome of the publish stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishResult {
    /// Unset only when publishing was skipped.
    pub content_hash: Option<String>,
    pub gateway: Option<String>,
}

/// Arguments for one aggregated upload.
#[derive(Debug, Clone, Copy)]
pub struct AggregatePublish<'a> {
    pub directory: &'a Path,
    pub backends: &'a [PinningBackend],
    /// Label the backends file the upload under.
    pub site_label: &'a str,
}

/// Uploads a directory to several pinning backends and returns one content identifier.
///
/// `Ok(None)` means the upload ran but produced no identifier.
pub trait AggregatePublisher {
    fn publish(
        &self,
        request: AggregatePublish<'_>,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// One item reported by a local node while adding a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedEntry {
    pub name: String,
    pub hash: String,
}

/// Client for a local node's add operation.
pub trait LocalNodeClient {
    /// Add `directory` recursively. The last entry is the directory root.
    fn add_recursive(
        &self,
        api_url: &str,
        directory: &Path,
    ) -> impl Future<Output = Result<Vec<AddedEntry>>> + Send;
}

impl PublishStrategy {
    /// Run the selected strategy against the staged directory.
    pub async fn execute<A, L>(
        &self,
        directory: &Path,
        site_label: &str,
        aggregate: &A,
        local: &L,
    ) -> Result<PublishResult, DeployError>
    where
        A: AggregatePublisher,
        L: LocalNodeClient,
    {
        match self {
            Self::Aggregated { backends } => {
                let names: Vec<&str> = backends.iter().map(PinningBackend::name).collect();
                tracing::info!(backends = ?names, "Publishing to pinning backends");

                let hash = aggregate
                    .publish(AggregatePublish {
                        directory,
                        backends,
                        site_label,
                    })
                    .await
                    .map_err(DeployError::at(Stage::Publish))?
                    .filter(|hash| !hash.is_empty())
                    .ok_or_else(|| {
                        DeployError::PublishFailed(format!(
                            "no content identifier returned by {}",
                            names.join(", ")
                        ))
                    })?;

                tracing::info!(hash = %hash, "Deployed shop to pinning backends");

                Ok(PublishResult {
                    content_hash: Some(hash),
                    gateway: Some(PINATA_GATEWAY.to_string()),
                })
            }
            Self::LocalNode { api_url } => {
                let entries = local
                    .add_recursive(api_url, directory)
                    .await
                    .map_err(DeployError::at(Stage::Publish))?;

                let hash = entries
                    .last()
                    .map(|entry| entry.hash.clone())
                    .filter(|hash| !hash.is_empty())
                    .ok_or_else(|| {
                        DeployError::PublishFailed(format!("local node {api_url} added nothing"))
                    })?;

                tracing::info!(hash = %hash, files = entries.len(), "Deployed shop on local node");

                Ok(PublishResult {
                    content_hash: Some(hash),
                    gateway: Some(api_url.clone()),
                })
            }
            Self::Skipped => {
                tracing::info!(
                    "Shop not published: no pinning backend configured and not a dev environment"
                );
                Ok(PublishResult::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClusterCredentials, ConfigRef, PinataCredentials};

    fn network(ipfs_api: Option<&str>) -> NetworkDescriptor {
        NetworkDescriptor {
            network_id: 1,
            ipfs_api: ipfs_api.map(str::to_string),
            config: ConfigRef::from("mainnet.toml"),
        }
    }

    fn cluster() -> Option<ClusterCredentials> {
        Some(ClusterCredentials {
            username: "dshop".to_string(),
            password: "pw".to_string(),
        })
    }

    fn pinata() -> Option<PinataCredentials> {
        Some(PinataCredentials {
            api_key: "key".to_string(),
            secret_api_key: "secret".to_string(),
        })
    }

    #[test]
    fn test_backend_names() {
        let backend = PinningBackend::Pinata {
            api_key: String::new(),
            secret_api_key: String::new(),
        };
        assert_eq!(backend.name(), "pinata");

        let backend = PinningBackend::IpfsCluster {
            host: String::new(),
            username: String::new(),
            password: String::new(),
        };
        assert_eq!(backend.name(), "ipfs-cluster");
    }

    #[test]
    fn test_select_both_backends() {
        let config = ResolvedNetworkConfig {
            cluster: cluster(),
            pinata: pinata(),
            ..Default::default()
        };

        let strategy =
            PublishStrategy::select(&network(Some("https://10.0.0.1:9094/")), &config).unwrap();

        assert_eq!(
            strategy,
            PublishStrategy::Aggregated {
                backends: vec![
                    PinningBackend::IpfsCluster {
                        host: "/ip4/10.0.0.1:9094/tcp/9094/https/".to_string(),
                        username: "dshop".to_string(),
                        password: "pw".to_string(),
                    },
                    PinningBackend::Pinata {
                        api_key: "key".to_string(),
                        secret_api_key: "secret".to_string(),
                    },
                ]
            }
        );
        assert!(strategy.uses_backend("pinata"));
    }

    #[test]
    fn test_select_cluster_needs_endpoint() {
        let config = ResolvedNetworkConfig {
            cluster: cluster(),
            ..Default::default()
        };

        assert_eq!(
            PublishStrategy::select(&network(None), &config).unwrap(),
            PublishStrategy::Skipped
        );
    }

    #[test]
    fn test_select_pinning_beats_local_node() {
        let config = ResolvedNetworkConfig {
            pinata: pinata(),
            ..Default::default()
        };

        let strategy =
            PublishStrategy::select(&network(Some("http://localhost:5001")), &config).unwrap();
        assert!(matches!(strategy, PublishStrategy::Aggregated { ref backends } if backends.len() == 1));
        assert!(!strategy.uses_backend("ipfs-cluster"));
    }

    #[test]
    fn test_select_local_node() {
        let strategy = PublishStrategy::select(
            &network(Some("http://localhost:5001")),
            &ResolvedNetworkConfig::default(),
        )
        .unwrap();

        assert_eq!(
            strategy,
            PublishStrategy::LocalNode {
                api_url: "http://localhost:5001".to_string()
            }
        );
    }

    #[test]
    fn test_select_skipped() {
        let config = ResolvedNetworkConfig::default();
        assert_eq!(
            PublishStrategy::select(&network(Some("https://ipfs.example.com")), &config).unwrap(),
            PublishStrategy::Skipped
        );
        assert_eq!(
            PublishStrategy::select(&network(None), &config).unwrap(),
            PublishStrategy::Skipped
        );
    }

    #[test]
    fn test_select_bad_cluster_endpoint() {
        let config = ResolvedNetworkConfig {
            cluster: cluster(),
            ..Default::default()
        };

        assert_eq!(
            PublishStrategy::select(&network(Some("ftp://cluster.example.com")), &config),
            Err(AddressError::UnsupportedProtocol("ftp".to_string()))
        );
    }
}
