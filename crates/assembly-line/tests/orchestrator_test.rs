use assembly_line::{BuildOrchestrator, Collaborators, RunConfig, Stage};
use assembly_line_build::fakes::{FakeBuilder, FakeDaemon, FakeScanner};
use assembly_line_build::{RegistryAuth, RegistryClient, ScanFinding, ScanOptions, ScanReport};
use assembly_line_core::{BuildAction, BuildOutcome, Cve, FailureKind, ImageRecord};
use assembly_line_notify::fakes::RecordingChat;
use assembly_line_notify::{AlertRoutes, NotificationGateway, NotifyChannels};
use assembly_line_store::fakes::{FailingStore, MemoryStore};
use assembly_line_store::{
    BuildMetric, DeliveryRecord, DeliveryRecorder, MetricsRecorder, RecordStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const IMAGE_NAME: &str = "image_assembly_line/debug";
const REGISTRY: &str = "registry.example.com";
const UPSTREAM: &str = "registry.example.com/image_assembly_line/debug";

const FAILED_CHANNEL: &str = "C-failed";
const READY_CHANNEL: &str = "C-ready";
const ALERT_CHANNEL: &str = "C-alert";

fn built_images() -> Vec<ImageRecord> {
    vec![
        ImageRecord::new(
            "sha256:older",
            vec![format!("{}:1.9", IMAGE_NAME)],
            1590000000,
        ),
        ImageRecord::new(
            "sha256:newest",
            vec![format!("{}:1.11", IMAGE_NAME)],
            1590110015,
        ),
    ]
}

fn run_config() -> RunConfig {
    RunConfig {
        target: "build".to_string(),
        image_name: IMAGE_NAME.to_string(),
        registry: REGISTRY.to_string(),
        build_directory: PathBuf::from("."),
        no_push: false,
        scan: ScanOptions {
            severity_level: "CRITICAL".to_string(),
            vuln_type: "os,library".to_string(),
            exit_code: 1,
        },
        notify_trivy_alert: true,
        trivy_slack_channel: None,
    }
}

fn finding(id: &str) -> ScanFinding {
    ScanFinding {
        target: "debian 10".to_string(),
        cve: Cve {
            pkg_name: "openssl".to_string(),
            vulnerability_id: id.to_string(),
            severity: "CRITICAL".to_string(),
            installed_version: "1.1.1d".to_string(),
            fixed_version: "1.1.1g".to_string(),
        },
    }
}

/// Orchestrator wired to in-memory fakes
struct Harness {
    daemon: Arc<FakeDaemon>,
    builder: Arc<FakeBuilder>,
    scanner: Arc<FakeScanner>,
    chat: Arc<RecordingChat>,
    metrics: Arc<MemoryStore>,
    deliveries: Arc<MemoryStore>,
    delivery_store: Arc<dyn RecordStore>,
    config: RunConfig,
    docker_config: TempDir,
}

impl Harness {
    fn new() -> Self {
        let deliveries = Arc::new(MemoryStore::new());
        Self {
            daemon: Arc::new(FakeDaemon::new().with_images(built_images())),
            builder: Arc::new(FakeBuilder::new()),
            scanner: Arc::new(FakeScanner::default()),
            chat: Arc::new(RecordingChat::new()),
            metrics: Arc::new(MemoryStore::new()),
            delivery_store: deliveries.clone(),
            deliveries,
            config: run_config(),
            docker_config: tempfile::tempdir().unwrap(),
        }
    }

    fn with_daemon(mut self, daemon: FakeDaemon) -> Self {
        self.daemon = Arc::new(daemon);
        self
    }

    fn with_builder(mut self, builder: FakeBuilder) -> Self {
        self.builder = Arc::new(builder);
        self
    }

    fn with_scanner(mut self, scanner: FakeScanner) -> Self {
        self.scanner = Arc::new(scanner);
        self
    }

    fn with_chat(mut self, chat: RecordingChat) -> Self {
        self.chat = Arc::new(chat);
        self
    }

    fn with_delivery_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.delivery_store = store;
        self
    }

    fn configure(mut self, f: impl FnOnce(&mut RunConfig)) -> Self {
        f(&mut self.config);
        self
    }

    fn collaborators(&self) -> Collaborators {
        let channels = NotifyChannels {
            build_failed: Some(FAILED_CHANNEL.to_string()),
            ready_to_deploy: Some(READY_CHANNEL.to_string()),
            alerts: AlertRoutes::new(Some(ALERT_CHANNEL.to_string())),
        };
        Collaborators {
            builder: self.builder.clone(),
            scanner: self.scanner.clone(),
            registry: RegistryClient::new(self.daemon.clone()),
            auth: Arc::new(RegistryAuth::with_config_path(
                self.docker_config.path().join("config.json"),
            )),
            notifier: NotificationGateway::new(self.chat.clone(), channels),
            metrics: MetricsRecorder::new(self.metrics.clone()),
            delivery: DeliveryRecorder::new(self.delivery_store.clone()),
        }
    }

    fn orchestrator_with(&self, deps: Collaborators) -> BuildOrchestrator {
        let action = BuildAction::new("org/debug", "build", "deadbeef", "1234");
        BuildOrchestrator::new(action, self.config.clone(), deps)
    }

    fn orchestrator(&self) -> BuildOrchestrator {
        self.orchestrator_with(self.collaborators())
    }

    fn metric(&self) -> BuildMetric {
        let metrics: Vec<BuildMetric> = self.metrics.list_json("build-time/");
        assert_eq!(metrics.len(), 1, "exactly one metric per run");
        metrics.into_iter().next().unwrap()
    }

    fn channels_posted(&self) -> Vec<String> {
        self.chat
            .messages()
            .into_iter()
            .map(|m| m.channel)
            .collect()
    }
}

#[tokio::test]
async fn test_successful_run_pushes_every_tag_and_latest() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();

    let report = orchestrator.execute().await.unwrap();

    assert_eq!(report.stage, Stage::Done);
    assert_eq!(orchestrator.stage(), Stage::Done);
    assert_eq!(report.image.image_id, "sha256:newest");
    assert_eq!(report.image.tags, vec!["1.11", "latest"]);

    let mut pushed: Vec<String> = harness
        .daemon
        .pushed()
        .into_iter()
        .map(|(name, tag, _)| format!("{}:{}", name, tag))
        .collect();
    pushed.sort();
    assert_eq!(
        pushed,
        vec![format!("{}:1.11", UPSTREAM), format!("{}:latest", UPSTREAM)]
    );

    let tagged = harness.daemon.tagged();
    assert_eq!(tagged.len(), 2);
    assert!(
        tagged
            .iter()
            .all(|(id, repo, _)| id == "sha256:newest" && repo == UPSTREAM)
    );

    let metric = harness.metric();
    assert_eq!(metric.outcome, BuildOutcome::Success);
    assert_eq!(metric.error_kind, "NoError");
    assert_eq!(metric.registry, REGISTRY);
    assert_eq!(metric.image_name, IMAGE_NAME);

    assert_eq!(harness.channels_posted(), vec![READY_CHANNEL]);

    let delivery: DeliveryRecord = harness
        .deliveries
        .get_json(&format!("deliveries/{}/1234.json", IMAGE_NAME))
        .unwrap();
    assert_eq!(delivery.upstream_repository, UPSTREAM);
    assert_eq!(delivery.tags, vec!["1.11", "latest"]);
}

#[tokio::test]
async fn test_build_request_carries_action_parameters() {
    let harness = Harness::new().configure(|c| c.build_directory = PathBuf::from("docker/debug"));

    harness.orchestrator().execute().await.unwrap();

    let requests = harness.builder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target, "build");
    assert_eq!(requests[0].image_name, IMAGE_NAME);
    assert_eq!(requests[0].registry, REGISTRY);
    assert_eq!(requests[0].commit_sha, "deadbeef");
    assert_eq!(requests[0].build_directory, PathBuf::from("docker/debug"));
    assert!(!requests[0].no_push);
}

#[tokio::test]
async fn test_push_404_fails_with_push_error() {
    let harness = Harness::new()
        .with_daemon(
            FakeDaemon::new()
                .with_images(built_images())
                .fail_push("latest", 404, "no such image"),
        );
    let orchestrator = harness.orchestrator();

    let err = orchestrator.execute().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::PushError);
    assert!(err.to_string().contains("no such image"));
    assert_eq!(orchestrator.stage(), Stage::Failed(FailureKind::PushError));

    let metric = harness.metric();
    assert_eq!(metric.outcome, BuildOutcome::Fail);
    assert_eq!(metric.error_kind, "PushError");

    assert_eq!(harness.channels_posted(), vec![FAILED_CHANNEL]);
    assert!(harness.deliveries.keys().is_empty());
}

#[tokio::test]
async fn test_tag_failure_fails_with_tagging_error() {
    let harness = Harness::new().with_daemon(
        FakeDaemon::new()
            .with_images(built_images())
            .fail_tag("1.11", 500, "conflict"),
    );

    let err = harness.orchestrator().execute().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::TaggingError);
    assert!(err.to_string().contains("conflict"));
    assert_eq!(harness.metric().error_kind, "TaggingError");
    assert!(
        harness
            .daemon
            .pushed()
            .iter()
            .all(|(_, tag, _)| tag != "1.11")
    );
}

#[tokio::test]
async fn test_no_push_skips_tagging_but_records_delivery() {
    let harness = Harness::new().configure(|c| c.no_push = true);

    let report = harness.orchestrator().execute().await.unwrap();

    assert!(report.pushed_tags.is_empty());
    assert_eq!(report.image.tags, vec!["1.11"]);
    assert!(harness.daemon.tagged().is_empty());
    assert!(harness.daemon.pushed().is_empty());
    assert!(harness.builder.requests()[0].no_push);
    assert_eq!(harness.deliveries.keys().len(), 1);
    assert_eq!(harness.metric().outcome, BuildOutcome::Success);
}

#[tokio::test]
async fn test_build_failure_stops_before_scan() {
    let harness = Harness::new().with_builder(FakeBuilder::failing("make: *** [build] Error 2"));

    let err = harness.orchestrator().execute().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::BuildError);
    assert!(harness.scanner.scanned().is_empty());
    assert!(harness.daemon.pushed().is_empty());
    assert_eq!(harness.metric().error_kind, "BuildError");
    assert_eq!(harness.channels_posted(), vec![FAILED_CHANNEL]);
}

#[tokio::test]
async fn test_missing_image_is_a_build_error() {
    let harness = Harness::new().with_daemon(FakeDaemon::new());

    let err = harness.orchestrator().execute().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::BuildError);
    assert!(err.to_string().contains(IMAGE_NAME));
}

#[tokio::test]
async fn test_scan_findings_are_notified_then_fail() {
    let report = ScanReport::new(1, vec![finding("CVE-2020-1967"), finding("CVE-2021-3449")]);
    let harness = Harness::new().with_scanner(FakeScanner::with_report(report));

    let err = harness.orchestrator().execute().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ScanError);
    assert_eq!(
        harness.scanner.scanned(),
        vec![format!("{}:1.11", IMAGE_NAME)]
    );
    assert_eq!(
        harness.channels_posted(),
        vec![ALERT_CHANNEL, ALERT_CHANNEL, FAILED_CHANNEL]
    );
    assert!(harness.daemon.pushed().is_empty());
    assert_eq!(harness.metric().error_kind, "ScanError");
}

#[tokio::test]
async fn test_scanner_crash_reports_its_stderr() {
    let report = ScanReport::new(1, Vec::new())
        .with_stderr("FATAL failed to download vulnerability DB");
    let harness = Harness::new().with_scanner(FakeScanner::with_report(report));

    let err = harness.orchestrator().execute().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ScanError);
    let message = err.to_string();
    assert!(message.contains("FATAL failed to download vulnerability DB"), "{}", message);
    assert!(!message.contains("0 vulnerabilities"), "{}", message);
    assert_eq!(harness.channels_posted(), vec![FAILED_CHANNEL]);
    assert!(harness.daemon.pushed().is_empty());
}

#[tokio::test]
async fn test_findings_below_threshold_do_not_fail() {
    let report = ScanReport::new(0, vec![finding("CVE-2020-1967")]);
    let harness = Harness::new()
        .with_scanner(FakeScanner::with_report(report))
        .configure(|c| c.trivy_slack_channel = Some("C-explicit".to_string()));

    harness.orchestrator().execute().await.unwrap();

    assert_eq!(harness.channels_posted(), vec!["C-explicit", READY_CHANNEL]);
}

#[tokio::test]
async fn test_findings_are_not_posted_when_alerts_disabled() {
    let report = ScanReport::new(0, vec![finding("CVE-2020-1967")]);
    let harness = Harness::new()
        .with_scanner(FakeScanner::with_report(report))
        .configure(|c| c.notify_trivy_alert = false);

    harness.orchestrator().execute().await.unwrap();

    assert_eq!(harness.channels_posted(), vec![READY_CHANNEL]);
}

#[tokio::test]
async fn test_scanner_failure_is_scan_error() {
    let harness = Harness::new().with_scanner(FakeScanner::failing("trivy: not found"));

    let err = harness.orchestrator().execute().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ScanError);
}

#[tokio::test]
async fn test_notifier_failure_does_not_change_outcome() {
    let harness = Harness::new().with_chat(RecordingChat::failing("channel_not_found"));

    let report = harness.orchestrator().execute().await.unwrap();

    assert_eq!(report.stage, Stage::Done);
    assert_eq!(harness.metric().outcome, BuildOutcome::Success);
}

#[tokio::test]
async fn test_notifier_failure_keeps_original_error_kind() {
    let harness = Harness::new()
        .with_chat(RecordingChat::failing("invalid_auth"))
        .with_daemon(
            FakeDaemon::new()
                .with_images(built_images())
                .fail_push("1.11", 401, "unauthorized"),
        );

    let err = harness.orchestrator().execute().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::PushError);
    assert_eq!(harness.metric().error_kind, "PushError");
}

#[tokio::test]
async fn test_metrics_failure_does_not_change_outcome() {
    let harness = Harness::new();
    let deps = Collaborators {
        metrics: MetricsRecorder::new(Arc::new(FailingStore::new("AccessDenied"))),
        ..harness.collaborators()
    };

    let report = harness.orchestrator_with(deps).execute().await.unwrap();

    assert_eq!(report.stage, Stage::Done);
    assert_eq!(harness.channels_posted(), vec![READY_CHANNEL]);
}

#[tokio::test]
async fn test_delivery_failure_is_unknown_error() {
    let harness =
        Harness::new().with_delivery_store(Arc::new(FailingStore::new("NoSuchBucket")));

    let err = harness.orchestrator().execute().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::UnknownError);
    assert!(err.to_string().contains("NoSuchBucket"));
    assert_eq!(harness.metric().error_kind, "UnknownError");
    assert_eq!(harness.channels_posted(), vec![FAILED_CHANNEL]);
}

#[tokio::test]
async fn test_latest_is_not_duplicated() {
    let images = vec![ImageRecord::new(
        "sha256:newest",
        vec![
            format!("{}:1.11", IMAGE_NAME),
            format!("{}:dev", IMAGE_NAME),
            format!("{}:latest", IMAGE_NAME),
        ],
        1590110015,
    )];
    let harness = Harness::new().with_daemon(FakeDaemon::new().with_images(images));

    let report = harness.orchestrator().execute().await.unwrap();

    assert_eq!(report.image.tags, vec!["1.11", "dev", "latest"]);
    assert_eq!(harness.daemon.pushed().len(), 3);
}

#[tokio::test]
async fn test_explicit_registry_credentials_are_sent_with_push() {
    let harness = Harness::new();
    let deps = Collaborators {
        auth: Arc::new(
            RegistryAuth::with_config_path(harness.docker_config.path().join("config.json"))
                .with_explicit("ci-bot", "s3cret"),
        ),
        ..harness.collaborators()
    };

    harness.orchestrator_with(deps).execute().await.unwrap();

    let pushed = harness.daemon.pushed();
    assert_eq!(pushed.len(), 2);
    assert!(
        pushed
            .iter()
            .all(|(_, _, user)| user.as_deref() == Some("ci-bot"))
    );
}

#[tokio::test]
async fn test_credentials_from_docker_config_are_used() {
    let harness = Harness::new();
    // "ci-bot:s3cret"
    std::fs::write(
        harness.docker_config.path().join("config.json"),
        r#"{"auths":{"registry.example.com":{"auth":"Y2ktYm90OnMzY3JldA=="}}}"#,
    )
    .unwrap();

    harness.orchestrator().execute().await.unwrap();

    assert!(
        harness
            .daemon
            .pushed()
            .iter()
            .all(|(_, _, user)| user.as_deref() == Some("ci-bot"))
    );
}
