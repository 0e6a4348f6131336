//! File system utils.

use std::path::{Path, PathBuf};

use anyhow::Context;

pub struct FsHandler;

impl FsHandler {
    /// Remove a directory tree. Succeeds when nothing exists at `path`.
    pub async fn remove_dir_if_exists(path: &Path) -> anyhow::Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                tracing::debug!("Removed directory: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove directory {}", path.display()))
            }
        }
    }

    /// Recursively copy `src` into `dst`, creating `dst` if needed.
    ///
    /// Returns the number of files copied.
    pub async fn copy_dir_all(src: &Path, dst: &Path) -> anyhow::Result<usize> {
        let mut pending = vec![(src.to_path_buf(), dst.to_path_buf())];
        let mut copied = 0;

        while let Some((from, to)) = pending.pop() {
            tokio::fs::create_dir_all(&to)
                .await
                .with_context(|| format!("Failed to create directory {}", to.display()))?;

            let mut entries = tokio::fs::read_dir(&from)
                .await
                .with_context(|| format!("Failed to read directory {}", from.display()))?;

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let target = to.join(entry.file_name());

                if file_type.is_dir() {
                    pending.push((entry.path(), target));
                } else {
                    tokio::fs::copy(entry.path(), &target).await.with_context(|| {
                        format!(
                            "Failed to copy {} to {}",
                            entry.path().display(),
                            target.display()
                        )
                    })?;
                    copied += 1;
                }
            }
        }

        tracing::debug!(
            src = %src.display(),
            dst = %dst.display(),
            files = copied,
            "Directory copied"
        );

        Ok(copied)
    }

    /// List every file below `root`, as paths relative to `root`, sorted.
    pub async fn list_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
        Ok(Self::walk(root).await?.files)
    }

    /// Walk the tree below `root`. Empty directories are listed too.
    pub async fn walk(root: &Path) -> anyhow::Result<DirListing> {
        let mut pending = vec![PathBuf::new()];
        let mut listing = DirListing::default();

        while let Some(relative) = pending.pop() {
            let dir = root.join(&relative);
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("Failed to read directory {}", dir.display()))?;

            while let Some(entry) = entries.next_entry().await? {
                let path = relative.join(entry.file_name());
                if entry.file_type().await?.is_dir() {
                    listing.dirs.push(path.clone());
                    pending.push(path);
                } else {
                    listing.files.push(path);
                }
            }
        }

        listing.dirs.sort();
        listing.files.sort();
        Ok(listing)
    }
}

/// Contents of a directory tree, relative to its root and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    pub dirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}
