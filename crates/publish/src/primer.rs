//! Warming gateway caches for freshly published content.

use std::{future::Future, path::Path, time::Duration};

use anyhow::{Context, Result};
use backon::{ExponentialBuilder, Retryable};
use url::Url;

use crate::{PublishStrategy, ResolvedNetworkConfig, fs::FsHandler, http};

/// Generic public gateway.
pub const PUBLIC_GATEWAY: &str = "https://gateway.ipfs.io";
/// Branded mirror, also the gateway DNS records point at.
pub const BRANDED_GATEWAY: &str = "https://ipfs-prod.ogn.app";
/// Pinata's own gateway, primed only when Pinata received the upload.
pub const PINATA_PRIME_GATEWAY: &str = "https://gateway.pinata.cloud";

const DEFAULT_RETRIES: usize = 2;

/// Fetches a gateway URL so the gateway caches the content behind it.
pub trait Primer {
    /// Prime `url`. `reference_dir` mirrors the content, so implementations may
    /// also fetch each file below it.
    fn prime(&self, url: &str, reference_dir: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// Gateway URLs to prime for `hash`, in order.
pub fn prime_targets(
    hash: &str,
    strategy: &PublishStrategy,
    config: &ResolvedNetworkConfig,
) -> Vec<String> {
    let mut gateways = vec![PUBLIC_GATEWAY, BRANDED_GATEWAY];
    if strategy.uses_backend("pinata") {
        gateways.push(PINATA_PRIME_GATEWAY);
    }
    if let Some(custom) = &config.ipfs_gateway {
        gateways.push(custom.as_str());
    }

    gateways
        .into_iter()
        .map(|gateway| format!("{gateway}/ipfs/{hash}"))
        .collect()
}

/// Outcome of priming a batch of gateways.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimeReport {
    pub attempted: Vec<String>,
    pub failed: Vec<String>,
}

impl PrimeReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Prime each target in turn. Failures are logged and recorded, never returned.
pub async fn prime_all<P: Primer>(
    primer: &P,
    targets: &[String],
    reference_dir: &Path,
) -> PrimeReport {
    let mut report = PrimeReport::default();

    for target in targets {
        report.attempted.push(target.clone());
        match primer.prime(target, reference_dir).await {
            Ok(()) => tracing::info!(url = %target, "Primed gateway"),
            Err(e) => {
                tracing::warn!(url = %target, err = ?e, "Failed to prime gateway");
                report.failed.push(target.clone());
            }
        }
    }

    report
}

/// Primes over HTTP: the root URL, then every file below the reference directory,
/// one request at a time.
#[derive(Debug, Clone)]
pub struct HttpPrimer {
    client: reqwest::Client,
    retries: usize,
}

impl HttpPrimer {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(http::create_client(http::DEFAULT_TIMEOUT)?))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Retries per URL after the first attempt.
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    async fn fetch(&self, url: &str) -> Result<()> {
        let get = || async move {
            self.client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            Ok::<_, reqwest::Error>(())
        };

        get.retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(250))
                .with_max_times(self.retries),
        )
        .notify(|err, dur| tracing::trace!(url = %url, err = %err, retry_in = ?dur, "Retrying gateway read"))
        .await
        .with_context(|| format!("Failed to fetch {url}"))
    }
}

/// URLs for the root and every file of `reference_dir` under `base`, with each
/// path segment percent-encoded.
async fn file_urls(base: &str, reference_dir: &Path) -> Result<Vec<String>> {
    let base = Url::parse(base).with_context(|| format!("Invalid gateway URL: {base}"))?;
    let files = FsHandler::list_files(reference_dir)
        .await
        .context("Failed to list files to prime")?;

    let mut urls = vec![join_segments(&base, [""])?];
    for file in &files {
        let segments = file.components().map(|c| c.as_os_str().to_string_lossy());
        urls.push(join_segments(&base, segments)?);
    }
    Ok(urls)
}

fn join_segments<I>(base: &Url, segments: I) -> Result<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| anyhow::anyhow!("Gateway URL cannot have a path: {base}"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.to_string())
}

impl Primer for HttpPrimer {
    async fn prime(&self, url: &str, reference_dir: &Path) -> Result<()> {
        let urls = file_urls(url, reference_dir).await?;
        let total = urls.len();

        let mut failures = Vec::new();
        for url in &urls {
            if let Err(e) = self.fetch(url).await {
                failures.push(e);
            }
        }

        if let Some(first) = failures.first() {
            anyhow::bail!("{} of {total} requests failed, first: {first:#}", failures.len());
        }

        tracing::debug!(url = %url, requests = total, "Gateway primed");
        Ok(())
    }
}
