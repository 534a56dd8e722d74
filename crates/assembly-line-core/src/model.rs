//! ビルド実行のデータモデル

use serde::{Deserialize, Serialize};
use std::fmt;

/// プッシュ時に必ず付与されるタグ
pub const LATEST_TAG: &str = "latest";

const DEFAULT_SERVER_URL: &str = "https://github.com";

/// デーモンのイメージ一覧 (`GET /images/json`) の 1 レコード
///
/// 同じ内容のイメージが複数タグを持つ場合、同じ `id` のレコードが複数返ることがある。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageRecord {
    pub id: String,
    #[serde(default)]
    pub repo_tags: Vec<String>,
    pub created: i64,
}

impl ImageRecord {
    pub fn new(id: impl Into<String>, repo_tags: Vec<String>, created: i64) -> Self {
        Self {
            id: id.into(),
            repo_tags,
            created,
        }
    }
}

/// ビルドに成功したイメージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltImage {
    /// コンテンツハッシュ (`sha256:...`)
    pub image_id: String,
    /// リポジトリ名（タグなし）
    pub image_name: String,
    /// 発見順のタグ
    pub tags: Vec<String>,
}

impl BuiltImage {
    pub fn new(image_id: impl Into<String>, image_name: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            image_name: image_name.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// `latest` が無ければ末尾に追加する。追加した場合は `true`
    pub fn ensure_latest_tag(&mut self) -> bool {
        if self.tags.iter().any(|t| t == LATEST_TAG) {
            return false;
        }
        self.tags.push(LATEST_TAG.to_string());
        true
    }

    /// スキャナーなどに渡すイメージ参照
    ///
    /// タグが無い場合はイメージ ID をそのまま使う。
    pub fn reference(&self) -> String {
        match self.tags.first() {
            Some(tag) => format!("{}:{}", self.image_name, tag),
            None => self.image_id.clone(),
        }
    }

    pub fn joined_tags(&self) -> String {
        self.tags.join(", ")
    }
}

/// スキャナーが検出した脆弱性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cve {
    pub pkg_name: String,
    #[serde(rename = "VulnerabilityID")]
    pub vulnerability_id: String,
    pub severity: String,
    #[serde(default)]
    pub installed_version: String,
    #[serde(default)]
    pub fixed_version: String,
}

/// 起動元の CI 実行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildAction {
    pub repository: String,
    pub workflow: String,
    pub commit_sha: String,
    pub run_id: String,
    pub server_url: String,
}

impl BuildAction {
    pub fn new(
        repository: impl Into<String>,
        workflow: impl Into<String>,
        commit_sha: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            workflow: workflow.into(),
            commit_sha: commit_sha.into(),
            run_id: run_id.into(),
            server_url: DEFAULT_SERVER_URL.to_string(),
        }
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn repository_url(&self) -> String {
        format!("{}/{}", self.server_url, self.repository)
    }

    pub fn run_url(&self) -> String {
        format!("{}/actions/runs/{}", self.repository_url(), self.run_id)
    }
}

/// ビルドの最終結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildOutcome {
    Success,
    Fail,
}

impl BuildOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildOutcome::Success => "success",
            BuildOutcome::Fail => "fail",
        }
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
