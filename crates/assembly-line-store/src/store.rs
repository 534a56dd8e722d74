//! Durable record stores

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Append-only store of JSON documents addressed by a `/`-separated key
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// Human readable location, for logs
    fn location(&self) -> String;
}

/// Stores records as files below a root directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // 書き込み途中のファイルを残さないよう一時ファイル経由で置き換える
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!("Wrote record {}", path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
