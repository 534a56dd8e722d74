//! Image Assembly Line build integration
//!
//! コンテナイメージのビルド、脆弱性スキャン、タグ付け、レジストリへのプッシュを
//! 担当するクレートです。外部とのやり取りはすべてトレイト越しに行い、
//! 本番実装 (Bollard / コマンド実行) とテスト用フェイクを差し替えられます。

pub mod auth;
pub mod builder;
pub mod daemon;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fakes;
pub mod registry;
pub mod scanner;

pub use auth::{RegistryAuth, RegistryCredentials, extract_registry};
pub use builder::{BuildRequest, CommandBuilder, ImageBuilder};
pub use daemon::{BollardDaemon, DockerDaemon};
pub use error::{DaemonError, Result};
pub use registry::{RegistryClient, select_latest};
pub use scanner::{
    ScanFinding, ScanOptions, ScanReport, TrivyScanner, VulnerabilityScanner, parse_report,
};
