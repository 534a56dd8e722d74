//! ビルドからデリバリー記録までの一連の処理
//!
//! `Init -> Building -> Scanning -> (NoPush | TaggingPushing) -> Recording -> Done`
//! の順に一方向で進み、どのステージで失敗しても `Failed(kind)` に遷移する。

use assembly_line_build::{
    BuildRequest, ImageBuilder, RegistryAuth, RegistryClient, RegistryCredentials, ScanOptions,
    VulnerabilityScanner,
};
use assembly_line_core::{AssemblyError, BuildAction, BuildOutcome, BuiltImage, FailureKind, Result};
use assembly_line_notify::{NotificationGateway, format_build_time};
use assembly_line_store::{DeliveryRecord, DeliveryRecorder, MetricsRecorder};
use chrono::Utc;
use futures_util::future::try_join_all;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// 実行の進行状況
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Building,
    Scanning,
    NoPush,
    TaggingPushing,
    Recording,
    Done,
    Failed(FailureKind),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Init => f.write_str("init"),
            Stage::Building => f.write_str("building"),
            Stage::Scanning => f.write_str("scanning"),
            Stage::NoPush => f.write_str("no-push"),
            Stage::TaggingPushing => f.write_str("tagging+pushing"),
            Stage::Recording => f.write_str("recording"),
            Stage::Done => f.write_str("done"),
            Stage::Failed(kind) => write!(f, "failed({})", kind),
        }
    }
}

/// 1 回の実行のパラメータ
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: String,
    pub image_name: String,
    pub registry: String,
    pub build_directory: PathBuf,
    pub no_push: bool,
    pub scan: ScanOptions,
    /// 検出した脆弱性を通知するか
    pub notify_trivy_alert: bool,
    /// 脆弱性通知の送信先（空なら製品ごとの振り分け）
    pub trivy_slack_channel: Option<String>,
}

impl RunConfig {
    /// プッシュ先のリポジトリ (`<registry>/<image_name>`)
    pub fn upstream_repository(&self) -> String {
        format!("{}/{}", self.registry.trim_end_matches('/'), self.image_name)
    }
}

/// 成功した実行の結果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub image: BuiltImage,
    pub stage: Stage,
    pub pushed_tags: Vec<String>,
    pub elapsed: Duration,
}

/// 外部との接点。テストではフェイクに差し替える
#[derive(Clone)]
pub struct Collaborators {
    pub builder: Arc<dyn ImageBuilder>,
    pub scanner: Arc<dyn VulnerabilityScanner>,
    pub registry: RegistryClient,
    pub auth: Arc<RegistryAuth>,
    pub notifier: NotificationGateway,
    pub metrics: MetricsRecorder,
    pub delivery: DeliveryRecorder,
}

pub struct BuildOrchestrator {
    action: BuildAction,
    config: RunConfig,
    deps: Collaborators,
    stage: Mutex<Stage>,
}

impl BuildOrchestrator {
    pub fn new(action: BuildAction, config: RunConfig, deps: Collaborators) -> Self {
        Self {
            action,
            config,
            deps,
            stage: Mutex::new(Stage::Init),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage.lock().map(|s| *s).unwrap_or(Stage::Init)
    }

    fn enter(&self, stage: Stage) {
        tracing::debug!("stage: {}", stage);
        if let Ok(mut current) = self.stage.lock() {
            *current = stage;
        }
    }

    /// 実行し、結果をメトリクスと通知に記録する
    ///
    /// メトリクスや通知の失敗はログに残すだけで、実行結果は変えない。
    pub async fn execute(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let result = self.run().await;
        let finished_at = Utc::now();

        match &result {
            Ok(report) => {
                self.deps
                    .metrics
                    .record_build(
                        started_at,
                        finished_at,
                        &self.config.registry,
                        &self.config.image_name,
                        BuildOutcome::Success,
                        None,
                    )
                    .await;

                let build_time = format_build_time(clock.elapsed());
                if let Err(e) = self
                    .deps
                    .notifier
                    .notify_ready_to_deploy(
                        &self.action,
                        &self.config.image_name,
                        &build_time,
                        &report.image.joined_tags(),
                    )
                    .await
                {
                    tracing::warn!("Failed to post ready-to-deploy notification: {}", e);
                }
            }
            Err(e) => {
                let kind = e.kind();
                self.enter(Stage::Failed(kind));
                tracing::error!(kind = %kind, "{}: {}", kind.summary(), e);

                self.deps
                    .metrics
                    .record_build(
                        started_at,
                        finished_at,
                        &self.config.registry,
                        &self.config.image_name,
                        BuildOutcome::Fail,
                        Some(kind),
                    )
                    .await;

                if let Err(notify_err) = self.deps.notifier.notify_build_failed(&self.action, kind).await {
                    tracing::warn!("Failed to post build-failed notification: {}", notify_err);
                }
            }
        }

        result
    }

    /// ビルド → スキャン → タグ付け・プッシュ → デリバリー記録
    pub async fn run(&self) -> Result<RunReport> {
        let clock = Instant::now();

        self.enter(Stage::Building);
        let mut image = self.build().await?;
        tracing::info!("Built {} ({})", image.image_name, image.image_id);

        self.enter(Stage::Scanning);
        self.scan(&image).await?;

        let pushed_tags = if self.config.no_push {
            self.enter(Stage::NoPush);
            tracing::info!("no_push: true");
            Vec::new()
        } else {
            self.enter(Stage::TaggingPushing);
            image.ensure_latest_tag();
            self.tag_and_push(&image).await?
        };

        self.enter(Stage::Recording);
        self.record_delivery(&image).await?;

        self.enter(Stage::Done);
        Ok(RunReport {
            image,
            stage: Stage::Done,
            pushed_tags,
            elapsed: clock.elapsed(),
        })
    }

    async fn build(&self) -> Result<BuiltImage> {
        let request = BuildRequest {
            target: self.config.target.clone(),
            image_name: self.config.image_name.clone(),
            registry: self.config.registry.clone(),
            commit_sha: self.action.commit_sha.clone(),
            build_directory: self.config.build_directory.clone(),
            no_push: self.config.no_push,
        };
        self.deps.builder.build(&request).await?;

        self.deps
            .registry
            .latest_built_image(&self.config.image_name)
            .await
    }

    async fn scan(&self, image: &BuiltImage) -> Result<()> {
        let report = self.deps.scanner.scan(image, &self.config.scan).await?;
        tracing::info!(
            "Scanned {}: {} finding(s), exit code {}",
            image.reference(),
            report.findings.len(),
            report.exit_code
        );

        if self.config.notify_trivy_alert {
            for finding in &report.findings {
                if let Err(e) = self
                    .deps
                    .notifier
                    .notify_vulnerability(
                        &image.image_name,
                        &finding.target,
                        &finding.cve,
                        self.config.trivy_slack_channel.as_deref(),
                    )
                    .await
                {
                    tracing::warn!(
                        "Failed to post vulnerability {}: {}",
                        finding.cve.vulnerability_id,
                        e
                    );
                }
            }
        }

        if !report.passed() {
            return Err(AssemblyError::Scan(
                report.failure_message(&self.config.scan.severity_level),
            ));
        }
        Ok(())
    }

    /// 全タグを並行してタグ付け・プッシュする
    ///
    /// 最初の失敗で残りの処理を破棄する。プッシュ済みのタグは取り消さない。
    async fn tag_and_push(&self, image: &BuiltImage) -> Result<Vec<String>> {
        let upstream = self.config.upstream_repository();
        let credentials = self.credentials(&upstream).await?;

        let tasks = image.tags.iter().map(|tag| {
            let registry = &self.deps.registry;
            let upstream = upstream.as_str();
            let credentials = credentials.as_ref();
            async move {
                registry.tag_image(&image.image_id, upstream, tag).await?;
                registry.push_image(upstream, tag, credentials).await?;
                tracing::info!("Pushed {}:{}", upstream, tag);
                Ok::<_, AssemblyError>(tag.clone())
            }
        });

        try_join_all(tasks).await
    }

    async fn credentials(&self, upstream: &str) -> Result<Option<RegistryCredentials>> {
        self.deps
            .auth
            .get_credentials(upstream)
            .await
            .map_err(|e| AssemblyError::Push {
                reference: upstream.to_string(),
                message: e.message(),
            })
    }

    async fn record_delivery(&self, image: &BuiltImage) -> Result<()> {
        let record = DeliveryRecord::new(
            image,
            self.config.upstream_repository(),
            &self.action.repository,
            &self.action.commit_sha,
            &self.action.run_id,
        );

        self.deps
            .delivery
            .record(&record)
            .await
            .map(|_| ())
            .map_err(|e| AssemblyError::Unknown(format!("Failed to record delivery: {}", e)))
    }
}
