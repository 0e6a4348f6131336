//! dshop publishes built shops to content-addressed storage.

mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use comfy_table::Table;

use cli::{Cli, Command, ListArgs, PublishArgs};
use dshop_publish::{
    CommandDnsUpdater, ConfigRef, DeploymentRequest, FileConfigResolver, HttpPrimer,
    IpfsDeployPublisher, JsonFileStore, KuboClient, NetworkDescriptor, ShopDeployer, ShopRef,
    StagingAssembler,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::Publish(args) => publish(args).await,
        Command::List(args) => list(args).await,
    }
}

fn open_store(path: Option<PathBuf>) -> Result<JsonFileStore> {
    match path {
        Some(path) => Ok(JsonFileStore::new(path)),
        None => JsonFileStore::at_default_location(),
    }
}

async fn publish(args: PublishArgs) -> Result<()> {
    let deployer = ShopDeployer {
        resolver: FileConfigResolver::default(),
        assembler: StagingAssembler::new(&args.dist_dir),
        aggregate: IpfsDeployPublisher::new(&args.ipfs_deploy_bin),
        local: KuboClient::new()?,
        primer: HttpPrimer::new()?,
        dns: CommandDnsUpdater::new(args.dns_hook),
        store: open_store(args.store)?,
    };

    let request = DeploymentRequest {
        output_dir: args.output_dir,
        data_dir_name: args.data_dir_name,
        network: NetworkDescriptor {
            network_id: args.network_id,
            ipfs_api: args.ipfs_api,
            config: ConfigRef::from(args.network_config.to_string_lossy().into_owned()),
        },
        subdomain: args.subdomain,
        shop: ShopRef { id: args.shop_id },
    };

    let outcome = deployer.deploy(&request).await?;

    tracing::info!("✓ Deployment complete!");
    tracing::info!("Deployment ID: {}", outcome.deployment_id);
    tracing::info!(
        "Content hash:  {}",
        outcome.content_hash.as_deref().unwrap_or("(not published)")
    );
    tracing::info!(
        "Gateway:       {}",
        outcome.gateway.as_deref().unwrap_or("-")
    );
    tracing::info!("Domain:        {}", outcome.domain.as_deref().unwrap_or("-"));
    for url in &outcome.prime.failed {
        tracing::warn!("Gateway not primed: {}", url);
    }

    Ok(())
}

async fn list(args: ListArgs) -> Result<()> {
    let store = open_store(args.store)?;
    let records = store.list().await?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Shop", "Created", "Hash", "Gateway", "Domain"]);

    for record in records
        .iter()
        .filter(|r| args.shop_id.is_none_or(|id| r.shop_id == id))
    {
        table.add_row(vec![
            record.id.to_string(),
            record.shop_id.to_string(),
            record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.content_hash.clone().unwrap_or_else(|| "-".to_string()),
            record.gateway.clone().unwrap_or_else(|| "-".to_string()),
            record.domain.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{table}");
    Ok(())
}
