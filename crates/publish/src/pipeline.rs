//! The publish pipeline: stage, publish, prime, update DNS, record.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    AggregatePublisher, ConfigResolver, DeployError, DeploymentStore, DnsRecords, DnsUpdater,
    LocalNodeClient, NetworkDescriptor, NewDeployment, PrimeReport, Primer, PublishStrategy,
    ResolvedNetworkConfig, Stage, StagingAssembler,
    dns::{DNS_GATEWAY_HOST, domain_url, validate_subdomain},
    primer::{prime_all, prime_targets},
};

/// The shop a deployment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShopRef {
    pub id: u64,
}

/// Input to one pipeline run.
///
/// Concurrent runs must use distinct `output_dir`s; the staging step wipes
/// `{output_dir}/public`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Holds the shop's `data` directory; `public` is staged next to it.
    pub output_dir: PathBuf,
    pub data_dir_name: String,
    pub network: NetworkDescriptor,
    pub subdomain: String,
    pub shop: ShopRef,
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentOutcome {
    pub deployment_id: u64,
    pub content_hash: Option<String>,
    pub domain: Option<String>,
    pub gateway: Option<String>,
    /// Empty unless content went to remote pinning backends.
    pub prime: PrimeReport,
}

/// Runs deployments against a fixed set of collaborators.
#[derive(Debug, Clone)]
pub struct ShopDeployer<C, A, L, P, D, S> {
    pub resolver: C,
    pub assembler: StagingAssembler,
    pub aggregate: A,
    pub local: L,
    pub primer: P,
    pub dns: D,
    pub store: S,
}

impl<C, A, L, P, D, S> ShopDeployer<C, A, L, P, D, S>
where
    C: ConfigResolver,
    A: AggregatePublisher,
    L: LocalNodeClient,
    P: Primer,
    D: DnsUpdater,
    S: DeploymentStore,
{
    /// Run the whole pipeline for one request.
    ///
    /// Stops at the first fatal error. Priming failures are only reported in
    /// [`DeploymentOutcome::prime`].
    pub async fn deploy(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentOutcome, DeployError> {
        tracing::info!(
            shop_id = request.shop.id,
            network_id = request.network.network_id,
            output_dir = %request.output_dir.display(),
            "Starting shop deployment..."
        );

        let config = self
            .resolver
            .get_config(&request.network.config)
            .map_err(DeployError::at(Stage::Config))?;

        if config.dns.is_some() {
            validate_subdomain(&request.subdomain).map_err(DeployError::at(Stage::Dns))?;
        }

        let staged = self
            .assembler
            .assemble(
                &request.output_dir,
                &request.data_dir_name,
                request.network.label(),
            )
            .await
            .map_err(DeployError::at(Stage::Staging))?;

        let strategy = PublishStrategy::select(&request.network, &config)?;
        let published = strategy
            .execute(
                &staged.public_dir,
                &request.data_dir_name,
                &self.aggregate,
                &self.local,
            )
            .await?;

        let prime = match (&strategy, &published.content_hash) {
            (PublishStrategy::Aggregated { .. }, Some(hash)) => {
                let targets = prime_targets(hash, &strategy, &config);
                prime_all(&self.primer, &targets, &staged.public_dir).await
            }
            _ => PrimeReport::default(),
        };

        let domain = self
            .update_domain(&config, &request.subdomain, published.content_hash.as_deref())
            .await?;

        let record = self
            .store
            .create(NewDeployment {
                shop_id: request.shop.id,
                domain: domain.clone(),
                gateway: published.gateway.clone(),
                content_hash: published.content_hash.clone(),
            })
            .await
            .map_err(DeployError::at(Stage::Record))?;

        tracing::info!(
            id = record.id,
            domain = ?record.domain,
            gateway = ?record.gateway,
            hash = ?record.content_hash,
            "Recorded shop deployment"
        );

        Ok(DeploymentOutcome {
            deployment_id: record.id,
            content_hash: record.content_hash,
            domain: record.domain,
            gateway: record.gateway,
            prime,
        })
    }

    /// Point the subdomain at the content when a DNS provider is configured.
    async fn update_domain(
        &self,
        config: &ResolvedNetworkConfig,
        subdomain: &str,
        content_hash: Option<&str>,
    ) -> Result<Option<String>, DeployError> {
        let Some(provider) = &config.dns else {
            return Ok(None);
        };

        let zone = config.domain.as_deref().ok_or_else(|| {
            DeployError::at(Stage::Dns)(anyhow::anyhow!(
                "DNS provider {provider} has no domain zone"
            ))
        })?;

        let Some(content_hash) = content_hash else {
            tracing::warn!(
                provider = %provider,
                "Nothing was published, leaving DNS records untouched"
            );
            return Ok(None);
        };

        let domain = domain_url(subdomain, zone);
        tracing::info!(domain = %domain, provider = %provider, "Updating DNS records");

        self.dns
            .set_records(DnsRecords {
                provider,
                gateway_host: DNS_GATEWAY_HOST,
                zone,
                subdomain,
                content_hash,
            })
            .await
            .map_err(DeployError::at(Stage::Dns))?;

        Ok(Some(domain))
    }
}
