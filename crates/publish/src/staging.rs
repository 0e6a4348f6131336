//! Assembly of the `public` directory that gets published.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use strum::IntoEnumIterator;

use crate::{NetworkLabel, fs::FsHandler};

/// Name of the staged directory under the output root.
pub const PUBLIC_DIR: &str = "public";
/// Name of the shop's data directory under the output root.
pub const SHOP_DATA_DIR: &str = "data";
/// Entry document rewritten with per-deployment values.
pub const ENTRY_DOCUMENT: &str = "index.html";
/// Shop metadata file inside the data directory.
pub const SHOP_CONFIG_FILE: &str = "config.json";
/// Favicon used when the shop does not configure one.
pub const DEFAULT_FAVICON: &str = "favicon.ico";

/// Public shop metadata read from the staged data.
///
/// Only the fields the entry document needs are kept; anything else in the file
/// is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicShopConfig {
    pub full_title: Option<String>,
    pub meta_description: Option<String>,
    pub favicon: Option<String>,
}

impl PublicShopConfig {
    /// Read the metadata file, falling back to an empty config when it is missing
    /// or malformed.
    pub async fn load_or_default(path: &Path) -> Self {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), err = %e, "Shop config not readable, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), err = %e, "Shop config is not valid JSON, using defaults");
                Self::default()
            }
        }
    }
}

/// Placeholder tokens in the entry document, in substitution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateToken {
    Title,
    MetaDesc,
    DataDir,
    Network,
    Favicon,
}

/// Values substituted into the entry document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateValues<'a> {
    pub title: &'a str,
    pub meta_description: &'a str,
    pub data_dir: &'a str,
    pub network: NetworkLabel,
    pub favicon: &'a str,
}

impl<'a> TemplateValues<'a> {
    pub fn new(config: &'a PublicShopConfig, data_dir: &'a str, network: NetworkLabel) -> Self {
        Self {
            title: config.full_title.as_deref().unwrap_or_default(),
            meta_description: config.meta_description.as_deref().unwrap_or_default(),
            data_dir,
            network,
            favicon: config.favicon.as_deref().unwrap_or(DEFAULT_FAVICON),
        }
    }

    fn value(&self, token: TemplateToken) -> &str {
        match token {
            TemplateToken::Title => self.title,
            TemplateToken::MetaDesc => self.meta_description,
            TemplateToken::DataDir => self.data_dir,
            TemplateToken::Network => self.network.as_ref(),
            TemplateToken::Favicon => self.favicon,
        }
    }
}

/// Substitute each token's first occurrence, in [`TemplateToken`] order.
///
/// Later occurrences of a token are left untouched.
pub fn render_entry_document(html: &str, values: &TemplateValues<'_>) -> String {
    TemplateToken::iter().fold(html.to_string(), |doc, token| {
        doc.replacen(token.as_ref(), values.value(token), 1)
    })
}

/// Result of a successful staging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSite {
    /// The `public` directory ready to publish.
    pub public_dir: PathBuf,
    pub shop_config: PublicShopConfig,
}

/// Builds `{output_dir}/public` from the pre-built distributable and the shop data.
#[derive(Debug, Clone)]
pub struct StagingAssembler {
    dist_dir: PathBuf,
}

impl StagingAssembler {
    pub fn new(dist_dir: impl Into<PathBuf>) -> Self {
        Self {
            dist_dir: dist_dir.into(),
        }
    }

    pub fn dist_dir(&self) -> &Path {
        &self.dist_dir
    }

    /// Assemble the public directory.
    ///
    /// Filesystem failures while clearing or copying abort; a missing or malformed
    /// shop config does not.
    pub async fn assemble(
        &self,
        output_dir: &Path,
        data_dir_name: &str,
        network: NetworkLabel,
    ) -> Result<StagedSite> {
        validate_dir_name(data_dir_name)?;

        let public_dir = output_dir.join(PUBLIC_DIR);

        FsHandler::remove_dir_if_exists(&public_dir)
            .await
            .context("Failed to clear previous public directory")?;

        FsHandler::copy_dir_all(&self.dist_dir, &public_dir)
            .await
            .context("Failed to copy distributable assets")?;

        let data_dir = public_dir.join(data_dir_name);
        FsHandler::copy_dir_all(&output_dir.join(SHOP_DATA_DIR), &data_dir)
            .await
            .context("Failed to copy shop data")?;

        let shop_config = PublicShopConfig::load_or_default(&data_dir.join(SHOP_CONFIG_FILE)).await;

        let entry = public_dir.join(ENTRY_DOCUMENT);
        let html = tokio::fs::read_to_string(&entry)
            .await
            .with_context(|| format!("Failed to read {}", entry.display()))?;
        let rendered = render_entry_document(
            &html,
            &TemplateValues::new(&shop_config, data_dir_name, network),
        );
        tokio::fs::write(&entry, rendered)
            .await
            .with_context(|| format!("Failed to write {}", entry.display()))?;

        tracing::info!(
            public_dir = %public_dir.display(),
            data_dir = data_dir_name,
            network = %network,
            "Staged shop for publishing"
        );

        Ok(StagedSite {
            public_dir,
            shop_config,
        })
    }
}

/// The data directory name becomes a path segment under `public`.
fn validate_dir_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => anyhow::bail!("Invalid data directory name: {name:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    const TEMPLATE: &str = r#"<html><head><title>TITLE</title><meta name="description" content="META_DESC"><link rel="icon" href="FAVICON"></head><body data-dir="DATA_DIR" data-network="NETWORK"></body></html>"#;

    fn write_fixture(root: &Path, shop_config: Option<&str>) -> (PathBuf, PathBuf) {
        let dist = root.join("dist");
        std::fs::create_dir_all(dist.join("assets")).unwrap();
        std::fs::write(dist.join(ENTRY_DOCUMENT), TEMPLATE).unwrap();
        std::fs::write(dist.join("assets/app.js"), "console.log(1)").unwrap();

        let output = root.join("out");
        std::fs::create_dir_all(output.join(SHOP_DATA_DIR)).unwrap();
        std::fs::write(output.join(SHOP_DATA_DIR).join("products.json"), "[]").unwrap();
        if let Some(config) = shop_config {
            std::fs::write(output.join(SHOP_DATA_DIR).join(SHOP_CONFIG_FILE), config).unwrap();
        }

        (dist, output)
    }

    #[test]
    fn test_render_all_tokens() {
        let config = PublicShopConfig {
            full_title: Some("Acme Shop".to_string()),
            meta_description: Some("Things".to_string()),
            favicon: Some("acme.png".to_string()),
        };
        let values = TemplateValues::new(&config, "acme", NetworkLabel::Mainnet);
        let rendered = render_entry_document(TEMPLATE, &values);

        for token in TemplateToken::iter() {
            assert!(!rendered.contains(token.as_ref()), "{token:?} left in output");
        }
        assert!(rendered.contains("<title>Acme Shop</title>"));
        assert!(rendered.contains(r#"content="Things""#));
        assert!(rendered.contains(r#"href="acme.png""#));
        assert!(rendered.contains(r#"data-dir="acme""#));
        assert!(rendered.contains(r#"data-network="mainnet""#));
    }

    #[test]
    fn test_render_first_occurrence_only() {
        let config = PublicShopConfig::default();
        let values = TemplateValues::new(&config, "acme", NetworkLabel::Rinkeby);
        let rendered = render_entry_document("DATA_DIR/DATA_DIR NETWORK", &values);

        assert_eq!(rendered, "acme/DATA_DIR rinkeby");
    }

    #[test]
    fn test_render_defaults() {
        let config = PublicShopConfig::default();
        let values = TemplateValues::new(&config, "acme", NetworkLabel::Localhost);
        let rendered = render_entry_document(TEMPLATE, &values);

        assert!(rendered.contains("<title></title>"));
        assert!(rendered.contains(r#"content="""#));
        assert!(rendered.contains(r#"href="favicon.ico""#));
        assert!(rendered.contains(r#"data-network="localhost""#));
    }

    #[test]
    fn test_shop_config_ignores_unknown_fields() {
        let config: PublicShopConfig = serde_json::from_str(
            r#"{"fullTitle": "Acme", "currency": "USD", "favicon": "f.ico"}"#,
        )
        .unwrap();
        assert_eq!(config.full_title.as_deref(), Some("Acme"));
        assert_eq!(config.meta_description, None);
    }

    #[tokio::test]
    async fn test_assemble() {
        let temp_dir = TempDir::new("dshop-staging").expect("Failed to create temp dir");
        let (dist, output) = write_fixture(
            temp_dir.path(),
            Some(r#"{"fullTitle": "Acme Shop", "metaDescription": "Things"}"#),
        );

        // Leftovers from a previous run must disappear.
        std::fs::create_dir_all(output.join(PUBLIC_DIR)).unwrap();
        std::fs::write(output.join(PUBLIC_DIR).join("stale.txt"), "old").unwrap();

        let staged = StagingAssembler::new(&dist)
            .assemble(&output, "acme", NetworkLabel::Mainnet)
            .await
            .expect("Staging failed");

        assert_eq!(staged.public_dir, output.join(PUBLIC_DIR));
        assert!(!staged.public_dir.join("stale.txt").exists());
        assert!(staged.public_dir.join("assets/app.js").exists());
        assert!(staged.public_dir.join("acme/products.json").exists());
        assert_eq!(staged.shop_config.full_title.as_deref(), Some("Acme Shop"));

        let html = std::fs::read_to_string(staged.public_dir.join(ENTRY_DOCUMENT)).unwrap();
        assert!(html.contains("<title>Acme Shop</title>"));
        assert!(html.contains(r#"data-network="mainnet""#));
    }

    #[tokio::test]
    async fn test_assemble_malformed_shop_config() {
        let temp_dir = TempDir::new("dshop-staging").expect("Failed to create temp dir");
        let (dist, output) = write_fixture(temp_dir.path(), Some("{ not json"));

        let staged = StagingAssembler::new(&dist)
            .assemble(&output, "acme", NetworkLabel::Localhost)
            .await
            .expect("Malformed shop config must not be fatal");

        assert_eq!(staged.shop_config, PublicShopConfig::default());
        let html = std::fs::read_to_string(staged.public_dir.join(ENTRY_DOCUMENT)).unwrap();
        assert!(html.contains(r#"href="favicon.ico""#));
    }

    #[tokio::test]
    async fn test_assemble_without_shop_config() {
        let temp_dir = TempDir::new("dshop-staging").expect("Failed to create temp dir");
        let (dist, output) = write_fixture(temp_dir.path(), None);

        let staged = StagingAssembler::new(&dist)
            .assemble(&output, "acme", NetworkLabel::Rinkeby)
            .await
            .expect("Missing shop config must not be fatal");

        assert_eq!(staged.shop_config, PublicShopConfig::default());
        assert!(!staged.public_dir.join("acme").join(SHOP_CONFIG_FILE).exists());
        assert!(staged.public_dir.join("acme/products.json").exists());

        let html = std::fs::read_to_string(staged.public_dir.join(ENTRY_DOCUMENT)).unwrap();
        assert!(html.contains("<title></title>"));
        assert!(html.contains(r#"content="""#));
        assert!(html.contains(r#"href="favicon.ico""#));
        assert!(html.contains(r#"data-dir="acme""#));
        assert!(html.contains(r#"data-network="rinkeby""#));
    }

    #[tokio::test]
    async fn test_assemble_missing_data_dir_fails() {
        let temp_dir = TempDir::new("dshop-staging").expect("Failed to create temp dir");
        let (dist, output) = write_fixture(temp_dir.path(), None);
        std::fs::remove_dir_all(output.join(SHOP_DATA_DIR)).unwrap();

        let result = StagingAssembler::new(&dist)
            .assemble(&output, "acme", NetworkLabel::Localhost)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_assemble_rejects_nested_data_dir_name() {
        let temp_dir = TempDir::new("dshop-staging").expect("Failed to create temp dir");
        let (dist, output) = write_fixture(temp_dir.path(), None);

        for name in ["", "..", "a/b", "/abs"] {
            let result = StagingAssembler::new(&dist)
                .assemble(&output, name, NetworkLabel::Localhost)
                .await;
            assert!(result.is_err(), "{name:?} should be rejected");
        }
    }
}
