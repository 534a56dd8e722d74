//! レジストリ認証処理
//!
//! プッシュ先レジストリの認証情報を解決します。
//! 優先順位は 明示指定 > Docker config.json の auths > credential helper です。

use crate::error::{DaemonError, Result};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Docker config.json の構造
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    /// credential helper 名 (例: "ecr-login", "desktop")
    #[serde(default)]
    creds_store: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// Base64エンコードされた "username:password"
    auth: Option<String>,
}

/// credential helper からのレスポンス
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialResponse {
    username: String,
    secret: String,
}

/// レジストリの認証情報
///
/// デーモンへのプッシュ要求時に `X-Registry-Auth` ヘッダーとして Base64 エンコードされる。
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    pub server_address: String,
}

impl RegistryCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        server_address: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            server_address: server_address.into(),
        }
    }

    pub fn to_docker_credentials(&self) -> DockerCredentials {
        DockerCredentials {
            username: Some(self.username.clone()),
            password: Some(self.password.clone()),
            serveraddress: Some(self.server_address.clone()),
            ..Default::default()
        }
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("server_address", &self.server_address)
            .finish()
    }
}

/// レジストリ認証を管理
#[derive(Debug)]
pub struct RegistryAuth {
    config_path: PathBuf,
    explicit: Option<(String, String)>,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryAuth {
    /// デフォルトで $DOCKER_CONFIG/config.json または ~/.docker/config.json を使用
    pub fn new() -> Self {
        let config_path = std::env::var("DOCKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            })
            .join("config.json");

        Self {
            config_path,
            explicit: None,
        }
    }

    /// 指定したパスの config.json を使用
    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self {
            config_path,
            explicit: None,
        }
    }

    /// ユーザー名とパスワードを明示指定する（config.json より優先）
    pub fn with_explicit(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.explicit = Some((username.into(), password.into()));
        self
    }

    /// リポジトリ名からレジストリの認証情報を取得
    ///
    /// * `Ok(Some(credentials))` - 認証情報が見つかった場合
    /// * `Ok(None)` - 認証情報が不要または見つからない場合
    pub async fn get_credentials(&self, repository: &str) -> Result<Option<RegistryCredentials>> {
        let registry = extract_registry(repository);

        if let Some((username, password)) = &self.explicit {
            tracing::debug!("Using explicit credentials for {}", registry);
            return Ok(Some(RegistryCredentials::new(
                username.as_str(),
                password.as_str(),
                registry,
            )));
        }

        // config.json が存在しない場合は認証なしで続行
        if !self.config_path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", self.config_path);
            return Ok(None);
        }

        let config = self.load_docker_config().await?;

        if let Some(auth_entry) = config.auths.get(&registry)
            && let Some(auth_b64) = &auth_entry.auth
            && let Some(creds) = decode_auth(auth_b64, &registry)?
        {
            tracing::debug!("Found credentials in auths for {}", registry);
            return Ok(Some(creds));
        }

        if let Some(helper) = &config.creds_store {
            tracing::debug!("Trying credential helper: {}", helper);
            match self.get_from_helper(helper, &registry).await {
                Ok(Some(creds)) => return Ok(Some(creds)),
                Ok(None) => {}
                Err(e) => tracing::debug!("Credential helper {} unusable: {}", helper, e),
            }
        }

        tracing::debug!("No credentials found for {}", registry);
        Ok(None)
    }

    async fn load_docker_config(&self) -> Result<DockerConfig> {
        let content = tokio::fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| DaemonError::AuthFailed {
                registry: self.config_path.display().to_string(),
                message: format!("Failed to read config.json: {}", e),
            })?;

        serde_json::from_str(&content).map_err(|e| DaemonError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message: format!("Failed to parse config.json: {}", e),
        })
    }

    async fn get_from_helper(
        &self,
        helper: &str,
        registry: &str,
    ) -> Result<Option<RegistryCredentials>> {
        let helper_cmd = format!("docker-credential-{}", helper);

        let mut child = Command::new(&helper_cmd)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DaemonError::AuthFailed {
                registry: registry.to_string(),
                message: format!("Failed to run {}: {}", helper_cmd, e),
            })?;

        // レジストリ名を stdin に渡す
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(registry.as_bytes()).await.ok();
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DaemonError::AuthFailed {
                registry: registry.to_string(),
                message: format!("Credential helper failed: {}", e),
            })?;

        if !output.status.success() {
            tracing::debug!(
                "Credential helper returned error for {}: {}",
                registry,
                String::from_utf8_lossy(&output.stderr)
            );
            return Ok(None);
        }

        let response: CredentialResponse =
            serde_json::from_slice(&output.stdout).map_err(|e| DaemonError::AuthFailed {
                registry: registry.to_string(),
                message: format!("Failed to parse credential helper response: {}", e),
            })?;

        Ok(Some(RegistryCredentials::new(
            response.username,
            response.secret,
            registry,
        )))
    }
}

/// リポジトリ名からレジストリを抽出
///
/// # Examples
/// - `ghcr.io/org/app` -> `ghcr.io`
/// - `myuser/app` -> `docker.io`
/// - `123456.dkr.ecr.region.amazonaws.com/app` -> `123456.dkr.ecr.region.amazonaws.com`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn extract_registry(repository: &str) -> String {
    if let Some((first, _)) = repository.split_once('/')
        && (first.contains('.') || first.contains(':') || first == "localhost")
    {
        return first.to_string();
    }

    "docker.io".to_string()
}

/// Base64エンコードされた "username:password" をデコード
fn decode_auth(auth_b64: &str, registry: &str) -> Result<Option<RegistryCredentials>> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(auth_b64)
        .map_err(|e| DaemonError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Failed to decode auth: {}", e),
        })?;

    let auth_str = String::from_utf8(decoded).map_err(|e| DaemonError::AuthFailed {
        registry: registry.to_string(),
        message: format!("Invalid UTF-8 in auth: {}", e),
    })?;

    Ok(auth_str
        .split_once(':')
        .map(|(username, password)| RegistryCredentials::new(username, password, registry)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_registry_ecr() {
        assert_eq!(
            extract_registry("123456789.dkr.ecr.ap-northeast-1.amazonaws.com/app"),
            "123456789.dkr.ecr.ap-northeast-1.amazonaws.com"
        );
    }

    #[test]
    fn test_extract_registry_docker_hub() {
        assert_eq!(extract_registry("myuser/app"), "docker.io");
        assert_eq!(extract_registry("nginx"), "docker.io");
    }

    #[test]
    fn test_extract_registry_localhost() {
        assert_eq!(extract_registry("localhost:5000/myapp"), "localhost:5000");
        assert_eq!(extract_registry("localhost/myapp"), "localhost");
    }

    #[test]
    fn test_decode_auth() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("AWS:token");
        let creds = decode_auth(&encoded, "ecr.example.com").unwrap().unwrap();
        assert_eq!(creds.username, "AWS");
        assert_eq!(creds.password, "token");
        assert_eq!(creds.server_address, "ecr.example.com");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = RegistryCredentials::new("AWS", "s3cr3t", "ecr.example.com");
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("s3cr3t"));
    }

    #[tokio::test]
    async fn test_credentials_from_config_auths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let encoded = base64::engine::general_purpose::STANDARD.encode("user:pass");
        std::fs::write(
            &path,
            format!(r#"{{"auths":{{"registry.example.com":{{"auth":"{}"}}}}}}"#, encoded),
        )
        .unwrap();

        let auth = RegistryAuth::with_config_path(path);
        let creds = auth
            .get_credentials("registry.example.com/team/app")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds.username, "user");
        assert_eq!(creds.server_address, "registry.example.com");
    }

    #[tokio::test]
    async fn test_missing_config_means_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let auth = RegistryAuth::with_config_path(dir.path().join("config.json"));
        assert!(auth.get_credentials("ghcr.io/org/app").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_explicit_credentials_win() {
        let dir = tempfile::tempdir().unwrap();
        let auth = RegistryAuth::with_config_path(dir.path().join("config.json"))
            .with_explicit("ci", "pw");
        let creds = auth.get_credentials("ghcr.io/org/app").await.unwrap().unwrap();
        assert_eq!(creds.username, "ci");
        assert_eq!(creds.server_address, "ghcr.io");
    }

    #[test]
    fn test_default_honours_docker_config_env() {
        temp_env::with_var("DOCKER_CONFIG", Some("/tmp/docker-cfg"), || {
            let auth = RegistryAuth::new();
            assert_eq!(
                auth.config_path,
                PathBuf::from("/tmp/docker-cfg").join("config.json")
            );
        });
    }
}
