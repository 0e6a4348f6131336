//! Durable records of completed deployments.

use std::{
    fs::{File, OpenOptions},
    future::Future,
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

/// Default file name of the deployment store.
pub const STORE_FILENAME: &str = "deployments.json";

/// A deployment about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeployment {
    pub shop_id: u64,
    pub domain: Option<String>,
    pub gateway: Option<String>,
    pub content_hash: Option<String>,
}

/// A recorded deployment. Never modified once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: u64,
    pub shop_id: u64,
    pub domain: Option<String>,
    pub gateway: Option<String>,
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persists deployment records.
pub trait DeploymentStore {
    /// Store a new record and return it with its assigned id.
    fn create(
        &self,
        deployment: NewDeployment,
    ) -> impl Future<Output = Result<DeploymentRecord>> + Send;
}

/// Stores every record in one JSON array file, serialized through an exclusive
/// file lock so concurrent processes do not lose writes.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform data directory, e.g. `~/.local/share/dshop/deployments.json`.
    pub fn at_default_location() -> Result<Self> {
        let dir = dirs::data_dir().context("No data directory on this platform")?;
        Ok(Self::new(dir.join("dshop").join(STORE_FILENAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record, oldest first. A missing file means no records.
    pub async fn list(&self) -> Result<Vec<DeploymentRecord>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<DeploymentRecord>> {
            if !path.exists() {
                return Ok(Vec::new());
            }
            let mut file = File::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.lock_shared()
                .with_context(|| format!("Failed to lock {}", path.display()))?;
            let records = read_records(&mut file, &path);
            FileExt::unlock(&file)?;
            records
        })
        .await
        .context("Deployment store task panicked")?
    }

    fn append(path: &Path, deployment: NewDeployment) -> Result<DeploymentRecord> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", path.display()))?;

        let result = (|| -> Result<DeploymentRecord> {
            let mut records = read_records(&mut file, path)?;
            let record = DeploymentRecord {
                id: records.iter().map(|r| r.id).max().unwrap_or(0) + 1,
                shop_id: deployment.shop_id,
                domain: deployment.domain,
                gateway: deployment.gateway,
                content_hash: deployment.content_hash,
                created_at: Utc::now(),
            };
            records.push(record.clone());

            let json = serde_json::to_vec_pretty(&records)
                .context("Failed to serialize deployment records")?;
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&json)?;
            file.sync_all()
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(record)
        })();

        FileExt::unlock(&file)?;
        result
    }
}

fn read_records(file: &mut File, path: &Path) -> Result<Vec<DeploymentRecord>> {
    let mut content = String::new();
    file.read_to_string(&mut content)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse deployment records in {}", path.display()))
}

impl DeploymentStore for JsonFileStore {
    async fn create(&self, deployment: NewDeployment) -> Result<DeploymentRecord> {
        let path = self.path.clone();
        let record = tokio::task::spawn_blocking(move || Self::append(&path, deployment))
            .await
            .context("Deployment store task panicked")??;

        tracing::debug!(id = record.id, path = %self.path.display(), "Deployment record written");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn deployment(shop_id: u64, hash: Option<&str>) -> NewDeployment {
        NewDeployment {
            shop_id,
            domain: None,
            gateway: Some("http://localhost:5001".to_string()),
            content_hash: hash.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let temp_dir = TempDir::new("dshop-store").expect("Failed to create temp dir");
        let store = JsonFileStore::new(temp_dir.path().join("nested").join(STORE_FILENAME));

        let first = store.create(deployment(7, Some("QmA"))).await.unwrap();
        let second = store.create(deployment(8, None)).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(second.content_hash, None);

        let records = store.list().await.unwrap();
        assert_eq!(records, vec![first, second]);
    }

    #[tokio::test]
    async fn test_list_missing_file() {
        let temp_dir = TempDir::new("dshop-store").expect("Failed to create temp dir");
        let store = JsonFileStore::new(temp_dir.path().join(STORE_FILENAME));

        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_store_fails() {
        let temp_dir = TempDir::new("dshop-store").expect("Failed to create temp dir");
        let path = temp_dir.path().join(STORE_FILENAME);
        std::fs::write(&path, "{ invalid json }").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.create(deployment(1, Some("QmA"))).await.is_err());
        assert!(store.list().await.is_err());

        // The broken file is left for an operator to inspect.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ invalid json }");
    }

    #[tokio::test]
    async fn test_concurrent_creates_do_not_collide() {
        let temp_dir = TempDir::new("dshop-store").expect("Failed to create temp dir");
        let store = JsonFileStore::new(temp_dir.path().join(STORE_FILENAME));

        let (a, b) = tokio::join!(
            store.create(deployment(1, Some("QmA"))),
            store.create(deployment(2, Some("QmB")))
        );

        let mut ids = vec![a.unwrap().id, b.unwrap().id];
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }
}
