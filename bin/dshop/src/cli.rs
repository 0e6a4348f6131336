use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "dshop")]
#[command(
    author,
    version,
    about = "Publish a built shop to IPFS and point its subdomain at it"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "DSHOP_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Stage, publish and record one shop deployment.
    Publish(PublishArgs),
    /// List recorded deployments.
    List(ListArgs),
}

#[derive(Debug, Clone, Args)]
pub struct PublishArgs {
    /// The shop's output directory. Must contain the shop's `data` directory.
    #[arg(long, env = "DSHOP_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// The pre-built distributable copied into `public`.
    #[arg(long, env = "DSHOP_DIST_DIR")]
    pub dist_dir: PathBuf,

    /// Name of the data directory inside `public`.
    #[arg(long, env = "DSHOP_DATA_DIR_NAME")]
    pub data_dir_name: String,

    /// The network ID (1 = mainnet, 4 = rinkeby, anything else = localhost).
    #[arg(long, env = "DSHOP_NETWORK_ID", default_value_t = 999)]
    pub network_id: u64,

    /// The storage node API URL, e.g. http://localhost:5001.
    #[arg(long, env = "DSHOP_IPFS_API")]
    pub ipfs_api: Option<String>,

    /// Path to the network's TOML configuration.
    #[arg(long, alias = "config", env = "DSHOP_NETWORK_CONFIG")]
    pub network_config: PathBuf,

    /// The shop's subdomain under the network's DNS zone.
    #[arg(long, env = "DSHOP_SUBDOMAIN")]
    pub subdomain: String,

    /// The ID of the shop being deployed.
    #[arg(long, env = "DSHOP_SHOP_ID")]
    pub shop_id: u64,

    /// Deployment store file.
    ///
    /// Defaults to `deployments.json` under the platform data directory.
    #[arg(long, env = "DSHOP_STORE")]
    pub store: Option<PathBuf>,

    /// Executable invoked to apply DNS records.
    #[arg(long, env = "DSHOP_DNS_HOOK")]
    pub dns_hook: Option<PathBuf>,

    /// The ipfs-deploy executable used for remote pinning backends.
    #[arg(long, env = "DSHOP_IPFS_DEPLOY_BIN", default_value = "ipfs-deploy")]
    pub ipfs_deploy_bin: String,
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Deployment store file.
    #[arg(long, env = "DSHOP_STORE")]
    pub store: Option<PathBuf>,

    /// Only show deployments of this shop.
    #[arg(long)]
    pub shop_id: Option<u64>,
}
