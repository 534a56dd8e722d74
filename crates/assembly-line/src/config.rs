//! コマンドライン・環境変数からの設定
//!
//! アクションの入力は CI ランナーが `INPUT_*` 環境変数として渡す。

use crate::orchestrator::{BuildOrchestrator, Collaborators, RunConfig};
use anyhow::{Context, bail};
use assembly_line_build::{
    BollardDaemon, CommandBuilder, RegistryAuth, RegistryClient, ScanOptions, TrivyScanner,
};
use assembly_line_core::BuildAction;
use assembly_line_notify::{AlertRoutes, NotificationGateway, NotifyChannels, SlackClient};
use assembly_line_store::{DeliveryRecorder, FileStore, MetricsRecorder, RecordStore, S3Store};
use clap::Parser;
use clap::builder::FalseyValueParser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Clone)]
#[command(name = "assembly-line")]
#[command(version)]
#[command(about = "コンテナイメージをビルド・スキャンしてレジストリへ届ける", long_about = None)]
pub struct Cli {
    /// ビルドツールに渡すターゲット
    #[arg(long, env = "INPUT_TARGET", default_value = "")]
    pub target: String,

    /// イメージ名（レジストリ名なし）
    #[arg(long, env = "INPUT_IMAGE_NAME")]
    pub image_name: String,

    /// スキャン対象の重要度 (例: CRITICAL,HIGH)
    #[arg(long, env = "INPUT_SEVERITY_LEVEL", default_value = "CRITICAL")]
    pub severity_level: String,

    /// 重要度以上の脆弱性が見つかった場合のスキャナー終了コード
    #[arg(long, env = "INPUT_SCAN_EXIT_CODE", default_value_t = 0)]
    pub scan_exit_code: i32,

    /// ビルドとスキャンのみ行い、プッシュしない
    #[arg(long, env = "INPUT_NO_PUSH", value_parser = FalseyValueParser::new())]
    pub no_push: bool,

    /// ビルドツールを実行するディレクトリ
    #[arg(long, env = "INPUT_BUILD_DIRECTORY", default_value = ".")]
    pub build_directory: PathBuf,

    /// スキャン対象の脆弱性の種類 (os,library)
    #[arg(long, env = "INPUT_TRIVY_VULN_TYPE", default_value = "os,library")]
    pub trivy_vuln_type: String,

    /// 検出した脆弱性を Slack に通知する
    #[arg(long, env = "INPUT_NOTIFY_TRIVY_ALERT", value_parser = FalseyValueParser::new())]
    pub notify_trivy_alert: bool,

    /// 脆弱性通知の送信先チャンネル ID
    #[arg(long, env = "INPUT_TRIVY_SLACK_CHANNEL")]
    pub trivy_slack_channel: Option<String>,

    /// プッシュ先のレジストリ
    #[arg(long = "registry", env = "REGISTRY_NAME")]
    pub registry: Option<String>,

    #[arg(long, env = "GITHUB_REPOSITORY", default_value = "")]
    pub repository: String,

    #[arg(long, env = "GITHUB_WORKFLOW", default_value = "")]
    pub workflow: String,

    #[arg(long = "commit", env = "GITHUB_SHA")]
    pub commit_sha: Option<String>,

    #[arg(long, env = "GITHUB_RUN_ID")]
    pub run_id: Option<String>,

    #[arg(long, env = "GITHUB_SERVER_URL", default_value = "https://github.com")]
    pub server_url: String,

    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub slack_bot_token: Option<String>,

    /// ビルド失敗の通知先
    #[arg(long, env = "SLACK_CONTAINERS_NOTIFICATION")]
    pub slack_build_failed_channel: Option<String>,

    /// デプロイ準備完了の通知先
    #[arg(long, env = "SLACK_CICD_NOTIFICATION_TEST")]
    pub slack_ready_channel: Option<String>,

    /// 脆弱性通知のデフォルト送信先
    #[arg(long, env = "SLACK_TRIVY_ALERT")]
    pub slack_alert_channel: Option<String>,

    /// 製品名のカンマ区切りリスト（チャンネル ID と位置で対応）
    #[arg(long, env = "TRIVY_PRODUCT_NAME_LIST", default_value = "")]
    pub trivy_product_names: String,

    #[arg(long, env = "TRIVY_SLACK_CHANNEL_ID_LIST", default_value = "")]
    pub trivy_channel_ids: String,

    /// ビルド時間の記録先 S3 バケット
    #[arg(long, env = "METRICS_BUCKET")]
    pub metrics_bucket: Option<String>,

    /// デリバリー記録の保存先 S3 バケット
    #[arg(long, env = "DELIVERY_BUCKET")]
    pub delivery_bucket: Option<String>,

    /// バケット未指定時の記録ディレクトリ
    #[arg(long, env = "ASSEMBLY_LINE_RECORD_DIR", default_value = ".assembly-line")]
    pub record_dir: PathBuf,

    #[arg(long, env = "REGISTRY_USERNAME")]
    pub registry_username: Option<String>,

    #[arg(long, env = "REGISTRY_PASSWORD", hide_env_values = true)]
    pub registry_password: Option<String>,

    /// ビルドツールのコマンドライン
    #[arg(long, env = "ASSEMBLY_LINE_BUILD_COMMAND", default_value = "make")]
    pub build_command: String,

    /// Trivy のコマンドライン
    #[arg(long, env = "ASSEMBLY_LINE_TRIVY_COMMAND", default_value = "trivy")]
    pub trivy_command: String,

    /// デバッグログを出力する
    #[arg(long, env = "RUNNER_DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

impl Cli {
    pub fn build_action(&self) -> anyhow::Result<BuildAction> {
        let Some(commit_sha) = non_empty(&self.commit_sha) else {
            bail!("GITHUB_SHA not found.");
        };
        // デリバリー記録のキーになるため、プッシュの有無に関わらず必須
        let Some(run_id) = non_empty(&self.run_id) else {
            bail!("GITHUB_RUN_ID not found.");
        };

        Ok(
            BuildAction::new(&self.repository, &self.workflow, commit_sha, run_id)
                .with_server_url(&self.server_url),
        )
    }

    pub fn run_config(&self) -> anyhow::Result<RunConfig> {
        let Some(registry) = non_empty(&self.registry) else {
            bail!("REGISTRY_NAME is not set.");
        };
        if self.image_name.trim().is_empty() {
            bail!("image_name is not set.");
        }

        Ok(RunConfig {
            target: self.target.clone(),
            image_name: self.image_name.clone(),
            registry,
            build_directory: self.build_directory.clone(),
            no_push: self.no_push,
            scan: ScanOptions {
                severity_level: self.severity_level.clone(),
                vuln_type: self.trivy_vuln_type.clone(),
                exit_code: self.scan_exit_code,
            },
            notify_trivy_alert: self.notify_trivy_alert,
            trivy_slack_channel: non_empty(&self.trivy_slack_channel),
        })
    }

    pub fn notify_channels(&self) -> NotifyChannels {
        NotifyChannels {
            build_failed: non_empty(&self.slack_build_failed_channel),
            ready_to_deploy: non_empty(&self.slack_ready_channel),
            alerts: AlertRoutes::new(non_empty(&self.slack_alert_channel))
                .with_route_lists(&self.trivy_product_names, &self.trivy_channel_ids),
        }
    }

    pub fn notification_gateway(&self) -> NotificationGateway {
        match non_empty(&self.slack_bot_token).map(SlackClient::new) {
            Some(Ok(client)) => NotificationGateway::new(Arc::new(client), self.notify_channels()),
            Some(Err(e)) => {
                tracing::warn!("Slack notifications disabled: {}", e);
                NotificationGateway::disabled()
            }
            None => {
                tracing::warn!("SLACK_BOT_TOKEN is not set; Slack notifications disabled");
                NotificationGateway::disabled()
            }
        }
    }

    pub fn registry_auth(&self) -> RegistryAuth {
        let auth = RegistryAuth::new();
        match (non_empty(&self.registry_username), non_empty(&self.registry_password)) {
            (Some(username), Some(password)) => auth.with_explicit(username, password),
            _ => auth,
        }
    }

    pub fn image_builder(&self) -> anyhow::Result<CommandBuilder> {
        CommandBuilder::from_command_line(&self.build_command)
            .context("build command is empty")
    }

    pub fn scanner(&self) -> anyhow::Result<TrivyScanner> {
        TrivyScanner::from_command_line(&self.trivy_command).context("trivy command is empty")
    }

    /// S3 バケットが指定されていれば S3、なければローカルディレクトリ
    pub async fn record_store(&self, bucket: &Option<String>) -> Arc<dyn RecordStore> {
        match non_empty(bucket) {
            Some(bucket) => Arc::new(S3Store::from_env(bucket).await),
            None => Arc::new(FileStore::new(&self.record_dir)),
        }
    }

    /// Docker に接続し、実行に必要なものをすべて組み立てる
    pub async fn orchestrator(&self) -> anyhow::Result<BuildOrchestrator> {
        let action = self.build_action()?;
        let config = self.run_config()?;

        let daemon = BollardDaemon::connect_local()
            .await
            .context("Docker デーモンに接続できません")?;

        let deps = Collaborators {
            builder: Arc::new(self.image_builder()?),
            scanner: Arc::new(self.scanner()?),
            registry: RegistryClient::new(Arc::new(daemon)),
            auth: Arc::new(self.registry_auth()),
            notifier: self.notification_gateway(),
            metrics: MetricsRecorder::new(self.record_store(&self.metrics_bucket).await),
            delivery: DeliveryRecorder::new(self.record_store(&self.delivery_bucket).await),
        };

        Ok(BuildOrchestrator::new(action, config, deps))
    }

    /// 秘密情報を伏せた設定の要約をデバッグログに出す
    pub fn log_summary(&self) {
        tracing::debug!(
            registry = ?self.registry,
            target = %self.target,
            image_name = %self.image_name,
            commit_sha = ?self.commit_sha,
            severity_level = %self.severity_level,
            scan_exit_code = self.scan_exit_code,
            trivy_vuln_type = %self.trivy_vuln_type,
            notify_trivy_alert = self.notify_trivy_alert,
            no_push = self.no_push,
            slack_bot_token = if self.slack_bot_token.is_some() { "<redacted>" } else { "<unset>" },
            registry_password = if self.registry_password.is_some() { "<redacted>" } else { "<unset>" },
            "[INFORMATION]"
        );
    }
}
