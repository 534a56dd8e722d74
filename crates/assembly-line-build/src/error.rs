use thiserror::Error;

/// コンテナデーモンとの通信エラー
#[derive(Debug, Error)]
pub enum DaemonError {
    /// 2xx 以外のステータス
    #[error("Docker daemon returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Docker connection error: {0}")]
    Connection(String),

    /// ステータスは成功だがプッシュの進捗ストリームにエラーが含まれていた
    #[error("{0}")]
    Stream(String),

    #[error("Registry authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },
}

impl DaemonError {
    /// デーモンが返したメッセージ（ステータスコードを除く）
    pub fn message(&self) -> String {
        match self {
            DaemonError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            DaemonError::Connection(msg) => {
                format!(
                    "Dockerに接続できません: {}\n\
                     \n\
                     ヒント:\n  • Dockerデーモンが起動しているか確認してください\n  \
                     • DOCKER_HOST の設定を確認してください",
                    msg
                )
            }
            DaemonError::AuthFailed { registry, message } => {
                format!(
                    "レジストリ '{}' の認証情報を取得できません: {}\n\
                     \n\
                     REGISTRY_USERNAME / REGISTRY_PASSWORD または docker login を確認してください。",
                    registry, message
                )
            }
            _ => self.to_string(),
        }
    }
}

impl From<bollard::errors::Error> for DaemonError {
    fn from(err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code,
                message,
            } => DaemonError::Status {
                status: status_code,
                message,
            },
            bollard::errors::Error::DockerStreamError { error } => DaemonError::Stream(error),
            other => DaemonError::Connection(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
