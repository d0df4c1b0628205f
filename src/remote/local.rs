//! Repository stored in a directory, either local or on a mounted share.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::debug;
use std::path::{Component, Path, PathBuf};

use super::{RemoteEntry, RemoteRepository};

pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a repository path onto the filesystem, refusing anything that
    /// would leave the repository root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => bail!("Repository path {:?} leaves the repository root", path),
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl RemoteRepository for LocalRepository {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let dir = self.resolve(dir)?;
        debug!("Listing {:?}...", dir);

        let mut read_dir = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to read directory {:?}", dir))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .with_context(|| format!("Failed to read directory {:?}", dir))?
        {
            let file_type = entry.file_type().await?;
            entries.push(RemoteEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: file_type.is_dir(),
            });
        }

        // read_dir order is unspecified
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let target = self.resolve(path)?;
        let Some(file_name) = target.file_name() else {
            bail!("Repository path {:?} does not name a file", path);
        };

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        // Readers never observe a half-written archive
        let temp = target.with_file_name(format!(".{}.part", file_name.to_string_lossy()));
        debug!("Writing {} bytes to {:?}", bytes.len(), temp);

        if let Err(e) = tokio::fs::write(&temp, &bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e).with_context(|| format!("Failed to write {:?}", temp));
        }
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e).with_context(|| format!("Failed to move {:?} to {:?}", temp, target));
        }

        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let source = self.resolve(path)?;
        debug!("Reading {:?}", source);
        tokio::fs::read(&source)
            .await
            .with_context(|| format!("Failed to read {:?}", source))
    }
}
