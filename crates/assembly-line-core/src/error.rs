use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 1 回の実行に付与される失敗の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    BuildError,
    ScanError,
    TaggingError,
    PushError,
    UnknownError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::BuildError => "BuildError",
            FailureKind::ScanError => "ScanError",
            FailureKind::TaggingError => "TaggingError",
            FailureKind::PushError => "PushError",
            FailureKind::UnknownError => "UnknownError",
        }
    }

    /// ログ出力用の短い説明
    pub fn summary(&self) -> &'static str {
        match self {
            FailureKind::BuildError => "image build error",
            FailureKind::ScanError => "image scan error",
            FailureKind::TaggingError => "image tagging error",
            FailureKind::PushError => "registry push error",
            FailureKind::UnknownError => "unknown error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Build failed: {0}")]
    Build(String),

    #[error("No built image found for '{pattern}'")]
    NoImageFound { pattern: String },

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Tagging {reference} failed: {message}")]
    Tagging { reference: String, message: String },

    #[error("Push {reference} failed: {message}")]
    Push { reference: String, message: String },

    #[error("{0}")]
    Unknown(String),
}

impl AssemblyError {
    pub fn tagging(repo: &str, tag: &str, message: impl Into<String>) -> Self {
        AssemblyError::Tagging {
            reference: format!("{}:{}", repo, tag),
            message: message.into(),
        }
    }

    pub fn push(repo: &str, tag: &str, message: impl Into<String>) -> Self {
        AssemblyError::Push {
            reference: format!("{}:{}", repo, tag),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AssemblyError::Build(_) | AssemblyError::NoImageFound { .. } => {
                FailureKind::BuildError
            }
            AssemblyError::Scan(_) => FailureKind::ScanError,
            AssemblyError::Tagging { .. } => FailureKind::TaggingError,
            AssemblyError::Push { .. } => FailureKind::PushError,
            AssemblyError::Unknown(_) => FailureKind::UnknownError,
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            AssemblyError::NoImageFound { pattern } => {
                format!(
                    "ビルド済みイメージが見つかりません: {}\n\
                     \n\
                     ビルドツールが IMAGE_NAME のイメージを作成しているか確認してください。",
                    pattern
                )
            }
            AssemblyError::Push { reference, message } => {
                format!(
                    "イメージのプッシュに失敗しました: {}\n{}\n\
                     \n\
                     レジストリの認証情報を確認してください。",
                    reference, message
                )
            }
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AssemblyError>;
