//! dshop-publish - Publishing library for static shop builds.
//!
//! This crate stages a built shop, uploads it to content-addressed storage,
//! warms gateway caches, points the shop's subdomain at the new content and
//! records the deployment.
//!
//! # Example
//!
//! ```no_run
//! use dshop_publish::{
//!     CommandDnsUpdater, ConfigRef, DeploymentRequest, FileConfigResolver, HttpPrimer,
//!     IpfsDeployPublisher, JsonFileStore, KuboClient, NetworkDescriptor, ShopDeployer,
//!     ShopRef, StagingAssembler,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let deployer = ShopDeployer {
//!     resolver: FileConfigResolver::default(),
//!     assembler: StagingAssembler::new("dist"),
//!     aggregate: IpfsDeployPublisher::default(),
//!     local: KuboClient::new()?,
//!     primer: HttpPrimer::new()?,
//!     dns: CommandDnsUpdater::default(),
//!     store: JsonFileStore::at_default_location()?,
//! };
//!
//! let outcome = deployer
//!     .deploy(&DeploymentRequest {
//!         output_dir: "out/acme".into(),
//!         data_dir_name: "acme".to_string(),
//!         network: NetworkDescriptor {
//!             network_id: 999,
//!             ipfs_api: Some("http://localhost:5001".to_string()),
//!             config: ConfigRef::from("networks/local.toml"),
//!         },
//!         subdomain: "acme".to_string(),
//!         shop: ShopRef { id: 1 },
//!     })
//!     .await?;
//! println!("{:?}", outcome.content_hash);
//! # Ok(())
//! # }
//! ```

pub mod address;
mod config;
pub mod dns;
mod error;
mod fs;
mod http;
mod pipeline;
pub mod primer;
mod publisher;
pub mod staging;
mod store;

pub use address::url_to_peer_address;
pub use config::{
    ClusterCredentials, ConfigRef, ConfigResolver, DEFAULT_CLUSTER_USER, DnsProvider,
    FileConfigResolver, NetworkDescriptor, NetworkLabel, PinataCredentials, RawNetworkConfig,
    ResolvedNetworkConfig,
};
pub use dns::{CommandDnsUpdater, DnsRecords, DnsUpdater};
pub use error::{AddressError, DeployError, Stage};
pub use pipeline::{DeploymentOutcome, DeploymentRequest, ShopDeployer, ShopRef};
pub use primer::{HttpPrimer, PrimeReport, Primer};
pub use publisher::{
    AddedEntry, AggregatePublish, AggregatePublisher, IpfsDeployCmdBuilder, IpfsDeployPublisher,
    KuboClient, LOCAL_NODE_MARKER, LocalNodeClient, PINATA_GATEWAY, PinningBackend,
    PublishResult, PublishStrategy,
};
pub use staging::{PublicShopConfig, StagedSite, StagingAssembler};
pub use store::{DeploymentRecord, DeploymentStore, JsonFileStore, NewDeployment, STORE_FILENAME};
