//! イメージの検索・タグ付け・プッシュ
//!
//! デーモンの応答を [`AssemblyError`] の分類に変換します。
//! 再試行は行わず、2xx 以外の応答はその呼び出しの失敗として扱います。

use crate::auth::RegistryCredentials;
use crate::daemon::DockerDaemon;
use assembly_line_core::{AssemblyError, BuiltImage, ImageRecord, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct RegistryClient {
    daemon: Arc<dyn DockerDaemon>,
}

impl RegistryClient {
    pub fn new(daemon: Arc<dyn DockerDaemon>) -> Self {
        Self { daemon }
    }

    /// 名前に一致するイメージの一覧。一致が無ければ空
    pub async fn list_images(&self, name_pattern: &str) -> Result<Vec<ImageRecord>> {
        self.daemon
            .list_images(name_pattern)
            .await
            .map_err(|e| AssemblyError::Unknown(format!("Failed to list images: {}", e)))
    }

    /// 最後にビルドされたイメージを取得
    pub async fn latest_built_image(&self, name_pattern: &str) -> Result<BuiltImage> {
        let records = self.list_images(name_pattern).await?;
        select_latest(&records, name_pattern).ok_or_else(|| AssemblyError::NoImageFound {
            pattern: name_pattern.to_string(),
        })
    }

    pub async fn tag_image(&self, image_id: &str, repo: &str, tag: &str) -> Result<()> {
        self.daemon
            .tag_image(image_id, repo, tag)
            .await
            .map_err(|e| AssemblyError::tagging(repo, tag, e.message()))
    }

    pub async fn push_image(
        &self,
        name: &str,
        tag: &str,
        credentials: Option<&RegistryCredentials>,
    ) -> Result<()> {
        self.daemon
            .push_image(name, tag, credentials)
            .await
            .map_err(|e| AssemblyError::push(name, tag, e.message()))
    }
}

/// `created` が最大のレコードを選ぶ（同値なら先に現れた方）
///
/// 同じ ID を持つ全レコードから、名前で始まるタグを発見順に集める。
pub fn select_latest(records: &[ImageRecord], name_pattern: &str) -> Option<BuiltImage> {
    let mut latest: Option<&ImageRecord> = None;
    for record in records {
        if latest.is_none_or(|current| record.created > current.created) {
            latest = Some(record);
        }
    }
    let latest = latest?;

    let mut tags: Vec<String> = Vec::new();
    for record in records.iter().filter(|r| r.id == latest.id) {
        for repo_tag in &record.repo_tags {
            if !repo_tag.starts_with(name_pattern) {
                continue;
            }
            if let Some((_, tag)) = repo_tag.rsplit_once(':')
                && !tags.iter().any(|t| t == tag)
            {
                tags.push(tag.to_string());
            }
        }
    }

    Some(BuiltImage::new(latest.id.clone(), name_pattern).with_tags(tags))
}
