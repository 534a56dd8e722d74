//! コンテナデーモン API
//!
//! ローカルのデーモン (`/var/run/docker.sock` など) に対するイメージ操作を抽象化します。
//! 本番では [`BollardDaemon`]、テストではフェイク実装を注入します。

use crate::auth::RegistryCredentials;
use crate::error::{DaemonError, Result};
use assembly_line_core::ImageRecord;
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{ListImagesOptions, PushImageOptions, TagImageOptions};
use futures_util::StreamExt;
use std::collections::HashMap;

/// デーモンのイメージ操作
///
/// 各呼び出しは 1 回の HTTP リクエストに対応し、2xx 以外は [`DaemonError::Status`] になる。
#[async_trait]
pub trait DockerDaemon: Send + Sync {
    /// `GET /images/json?filters={"reference":[pattern]}`
    async fn list_images(&self, reference: &str) -> Result<Vec<ImageRecord>>;

    /// `POST /images/{id}/tag?repo=..&tag=..`
    async fn tag_image(&self, image_id: &str, repo: &str, tag: &str) -> Result<()>;

    /// `POST /images/{name}/push?tag=..`
    async fn push_image(
        &self,
        name: &str,
        tag: &str,
        credentials: Option<&RegistryCredentials>,
    ) -> Result<()>;
}

/// Bollard によるデーモン実装
#[derive(Clone)]
pub struct BollardDaemon {
    docker: Docker,
}

impl BollardDaemon {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// DOCKER_HOST またはローカルソケットに接続し、疎通を確認する
    pub async fn connect_local() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DaemonError::Connection(e.to_string()))?;
        docker
            .ping()
            .await
            .map_err(|e| DaemonError::Connection(e.to_string()))?;
        Ok(Self::new(docker))
    }
}

#[async_trait]
impl DockerDaemon for BollardDaemon {
    async fn list_images(&self, reference: &str) -> Result<Vec<ImageRecord>> {
        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![reference.to_string()]);

        let options = ListImagesOptions {
            filters: Some(filters),
            ..Default::default()
        };

        tracing::debug!("Listing images: reference={}", reference);
        let summaries = self.docker.list_images(Some(options)).await?;

        Ok(summaries
            .into_iter()
            .map(|s| ImageRecord::new(s.id, s.repo_tags, s.created))
            .collect())
    }

    async fn tag_image(&self, image_id: &str, repo: &str, tag: &str) -> Result<()> {
        let options = TagImageOptions {
            repo: Some(repo.to_string()),
            tag: Some(tag.to_string()),
            ..Default::default()
        };

        tracing::debug!("Tagging {} as {}:{}", image_id, repo, tag);
        self.docker.tag_image(image_id, Some(options)).await?;
        Ok(())
    }

    async fn push_image(
        &self,
        name: &str,
        tag: &str,
        credentials: Option<&RegistryCredentials>,
    ) -> Result<()> {
        let options = PushImageOptions {
            tag: Some(tag.to_string()),
            ..Default::default()
        };

        tracing::debug!("Pushing {}:{}", name, tag);
        let mut stream = self.docker.push_image(
            name,
            Some(options),
            credentials.map(RegistryCredentials::to_docker_credentials),
        );

        // エラー行は DockerStreamError として返ってくる
        let mut last_status = String::new();
        while let Some(result) = stream.next().await {
            let info = result?;
            if let Some(status) = info.status
                && status != last_status
            {
                tracing::debug!("  {}:{} {}", name, tag, status);
                last_status = status;
            }
        }
        Ok(())
    }
}
