use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::utils::error::AppError;
use crate::Result;

/// Blob storage for fetched documents kept for diagnosis.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, key: &str, content: &[u8]) -> Result<()>;
}

pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn put(&self, key: &str, content: &[u8]) -> Result<()> {
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.starts_with('.') {
            return Err(AppError::Validation(format!("invalid content key '{}'", key)));
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(key);
        tokio::fs::write(&path, content).await?;

        debug!(path = %path.display(), bytes = content.len(), "stored content");
        Ok(())
    }
}
