//! Aggregated publishing through the external `ipfs-deploy` tool.

mod cmd;

use anyhow::{Context, Result};
use tokio::process::Command;

pub use cmd::IpfsDeployCmdBuilder;

use super::{AggregatePublish, AggregatePublisher, PinningBackend};

/// Runs `ipfs-deploy` with one pinner per backend.
///
/// Credentials travel in the tool's environment variables so they never show up
/// in process listings.
#[derive(Debug, Clone)]
pub struct IpfsDeployPublisher {
    program: String,
}

impl Default for IpfsDeployPublisher {
    fn default() -> Self {
        Self::new("ipfs-deploy")
    }
}

impl IpfsDeployPublisher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn credential_env(backend: &PinningBackend) -> Vec<(&'static str, String)> {
        match backend {
            PinningBackend::IpfsCluster {
                host,
                username,
                password,
            } => vec![
                ("IPFS_DEPLOY_IPFS_CLUSTER__HOST", host.clone()),
                ("IPFS_DEPLOY_IPFS_CLUSTER__USERNAME", username.clone()),
                ("IPFS_DEPLOY_IPFS_CLUSTER__PASSWORD", password.clone()),
            ],
            PinningBackend::Pinata {
                api_key,
                secret_api_key,
            } => vec![
                ("IPFS_DEPLOY_PINATA__API_KEY", api_key.clone()),
                ("IPFS_DEPLOY_PINATA__SECRET_API_KEY", secret_api_key.clone()),
            ],
        }
    }
}

impl AggregatePublisher for IpfsDeployPublisher {
    async fn publish(&self, request: AggregatePublish<'_>) -> Result<Option<String>> {
        let cmd = request
            .backends
            .iter()
            .fold(
                IpfsDeployCmdBuilder::new(request.directory).program(&self.program),
                |cmd, backend| cmd.pinner(backend.name()),
            )
            .site_domain(request.site_label)
            .build();

        let (program, args) = cmd
            .split_first()
            .context("ipfs-deploy command is empty")?;

        let envs = request.backends.iter().flat_map(Self::credential_env);

        tracing::debug!(cmd = ?cmd, "Running ipfs-deploy");

        let output = Command::new(program)
            .args(args)
            .envs(envs)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {program}"))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            anyhow::bail!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(extract_content_id(&stdout))
    }
}

/// Find the last content identifier printed in the tool's output.
fn extract_content_id(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .rev()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .find(|token| looks_like_content_id(token))
        .map(str::to_string)
}

fn looks_like_content_id(token: &str) -> bool {
    let v0 = token.len() == 46 && token.starts_with("Qm");
    let v1 = token.len() > 50 && (token.starts_with("bafy") || token.starts_with("bafk"));
    (v0 || v1) && token.chars().all(|c| c.is_ascii_alphanumeric())
}
