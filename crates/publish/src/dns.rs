//! Pointing a shop subdomain at published content.

use std::{future::Future, path::PathBuf};

use anyhow::{Context, Result};
use tokio::process::Command;

use crate::DnsProvider;

/// Gateway host the DNS records route through.
pub const DNS_GATEWAY_HOST: &str = "ipfs-prod.ogn.app";

/// Parameters for one DNS update.
#[derive(Debug, Clone, Copy)]
pub struct DnsRecords<'a> {
    pub provider: &'a DnsProvider,
    pub gateway_host: &'a str,
    pub zone: &'a str,
    pub subdomain: &'a str,
    pub content_hash: &'a str,
}

/// Applies DNS records at a provider.
pub trait DnsUpdater {
    fn set_records(&self, records: DnsRecords<'_>) -> impl Future<Output = Result<()>> + Send;
}

/// Public URL of a shop.
pub fn domain_url(subdomain: &str, zone: &str) -> String {
    format!("https://{subdomain}.{zone}")
}

/// Check that `subdomain` is a single DNS label.
pub fn validate_subdomain(subdomain: &str) -> Result<()> {
    let valid = !subdomain.is_empty()
        && subdomain.len() <= 63
        && !subdomain.starts_with('-')
        && !subdomain.ends_with('-')
        && subdomain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');

    if !valid {
        anyhow::bail!("Invalid subdomain {subdomain:?}");
    }
    Ok(())
}

/// Delegates DNS updates to an operator supplied executable.
///
/// The hook receives the provider name as its only argument and everything else
/// in `DSHOP_DNS_*` environment variables. A non-zero exit fails the update.
#[derive(Debug, Clone, Default)]
pub struct CommandDnsUpdater {
    hook: Option<PathBuf>,
}

impl CommandDnsUpdater {
    pub fn new(hook: Option<PathBuf>) -> Self {
        Self { hook }
    }

    fn env(records: &DnsRecords<'_>) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("DSHOP_DNS_PROVIDER", records.provider.to_string()),
            ("DSHOP_DNS_GATEWAY", records.gateway_host.to_string()),
            ("DSHOP_DNS_ZONE", records.zone.to_string()),
            ("DSHOP_DNS_SUBDOMAIN", records.subdomain.to_string()),
            ("DSHOP_DNS_HASH", records.content_hash.to_string()),
        ];

        match records.provider {
            DnsProvider::Cloudflare { email, api_key } => {
                env.push(("DSHOP_DNS_CLOUDFLARE_API_KEY", api_key.clone()));
                if let Some(email) = email {
                    env.push(("DSHOP_DNS_CLOUDFLARE_EMAIL", email.clone()));
                }
            }
            DnsProvider::CloudDns { credentials } => {
                env.push(("DSHOP_DNS_GCP_CREDENTIALS", credentials.clone()));
            }
        }

        env
    }
}

impl DnsUpdater for CommandDnsUpdater {
    async fn set_records(&self, records: DnsRecords<'_>) -> Result<()> {
        let hook = self
            .hook
            .as_ref()
            .with_context(|| format!("No DNS hook configured for provider {}", records.provider))?;

        let output = Command::new(hook)
            .arg(records.provider.to_string())
            .envs(Self::env(&records))
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run DNS hook {}", hook.display()))?;

        if !output.status.success() {
            anyhow::bail!(
                "DNS hook {} exited with {}: {}",
                hook.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        tracing::debug!(
            provider = %records.provider,
            subdomain = records.subdomain,
            zone = records.zone,
            "DNS hook succeeded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloudflare() -> DnsProvider {
        DnsProvider::Cloudflare {
            email: Some("ops@example.com".to_string()),
            api_key: "cf-key".to_string(),
        }
    }

    #[test]
    fn test_domain_url() {
        assert_eq!(
            domain_url("acme", "shops.example.com"),
            "https://acme.shops.example.com"
        );
    }

    #[test]
    fn test_validate_subdomain() {
        assert!(validate_subdomain("acme").is_ok());
        assert!(validate_subdomain("acme-2").is_ok());
        for bad in ["", "-acme", "acme-", "a.b", "a b", "x".repeat(64).as_str()] {
            assert!(validate_subdomain(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_hook_env() {
        let provider = cloudflare();
        let env = CommandDnsUpdater::env(&DnsRecords {
            provider: &provider,
            gateway_host: DNS_GATEWAY_HOST,
            zone: "shops.example.com",
            subdomain: "acme",
            content_hash: "QmHash",
        });

        assert!(env.contains(&("DSHOP_DNS_PROVIDER", "cloudflare".to_string())));
        assert!(env.contains(&("DSHOP_DNS_GATEWAY", "ipfs-prod.ogn.app".to_string())));
        assert!(env.contains(&("DSHOP_DNS_CLOUDFLARE_API_KEY", "cf-key".to_string())));
        assert!(!env.iter().any(|(k, _)| *k == "DSHOP_DNS_GCP_CREDENTIALS"));
    }

    #[tokio::test]
    async fn test_missing_hook_fails() {
        let provider = cloudflare();
        let result = CommandDnsUpdater::default()
            .set_records(DnsRecords {
                provider: &provider,
                gateway_host: DNS_GATEWAY_HOST,
                zone: "shops.example.com",
                subdomain: "acme",
                content_hash: "QmHash",
            })
            .await;

        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hook_receives_records() {
        use std::os::unix::fs::PermissionsExt;
        use tempdir::TempDir;

        let temp_dir = TempDir::new("dshop-dns").expect("Failed to create temp dir");
        let hook = temp_dir.path().join("hook.sh");
        let out = temp_dir.path().join("out.txt");
        std::fs::write(
            &hook,
            format!(
                "#!/bin/sh\necho \"$1 $DSHOP_DNS_SUBDOMAIN.$DSHOP_DNS_ZONE $DSHOP_DNS_HASH\" > {}\n",
                out.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

        let provider = DnsProvider::CloudDns {
            credentials: "{}".to_string(),
        };
        CommandDnsUpdater::new(Some(hook))
            .set_records(DnsRecords {
                provider: &provider,
                gateway_host: DNS_GATEWAY_HOST,
                zone: "shops.example.com",
                subdomain: "acme",
                content_hash: "QmHash",
            })
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(out).unwrap().trim(),
            "cloud-dns acme.shops.example.com QmHash"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hook_failure_propagates() {
        let provider = cloudflare();
        let result = CommandDnsUpdater::new(Some(PathBuf::from("/bin/false")))
            .set_records(DnsRecords {
                provider: &provider,
                gateway_host: DNS_GATEWAY_HOST,
                zone: "shops.example.com",
                subdomain: "acme",
                content_hash: "QmHash",
            })
            .await;

        assert!(result.is_err());
    }
}
