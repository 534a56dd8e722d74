//! Image Assembly Line
//!
//! CI から呼び出され、コンテナイメージのビルド、脆弱性スキャン、
//! レジストリへのタグ付け・プッシュ、デリバリー記録までを一続きで実行します。
//! 結果はビルド時間として記録され、Slack に通知されます。

pub mod config;
pub mod logging;
pub mod orchestrator;

pub use config::Cli;
pub use orchestrator::{BuildOrchestrator, Collaborators, RunConfig, RunReport, Stage};
