//! 脆弱性スキャン
//!
//! Trivy を外部プロセスとして実行し、JSON レポートを読み取ります。

use crate::builder::stderr_tail;
use assembly_line_core::{AssemblyError, BuiltImage, Cve, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;

/// スキャナーの閾値設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// 対象とする重要度 (例: "CRITICAL,HIGH")
    pub severity_level: String,
    /// 対象とする脆弱性の種類 (例: "os,library")
    pub vuln_type: String,
    /// 閾値以上の脆弱性が見つかった場合の終了コード
    pub exit_code: i32,
}

/// 1 件の検出結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFinding {
    /// スキャン対象 (OS パッケージやロックファイル)
    pub target: String,
    pub cve: Cve,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub exit_code: i32,
    pub findings: Vec<ScanFinding>,
    /// スキャナーの stderr の末尾
    pub stderr: String,
}

impl ScanReport {
    pub fn new(exit_code: i32, findings: Vec<ScanFinding>) -> Self {
        Self {
            exit_code,
            findings,
            stderr: String::new(),
        }
    }

    pub fn clean() -> Self {
        Self::new(0, Vec::new())
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// 閾値を超える脆弱性が無かったか
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// 失敗時のエラーメッセージ
    ///
    /// 検出結果なしで失敗した場合はスキャナー自体のエラーとみなし、stderr を含める。
    pub fn failure_message(&self, severity_level: &str) -> String {
        if self.findings.is_empty() {
            let stderr = self.stderr.trim();
            if stderr.is_empty() {
                format!("scanner exited with {} and reported no findings", self.exit_code)
            } else {
                format!(
                    "scanner exited with {} and reported no findings\n{}",
                    self.exit_code, stderr
                )
            }
        } else {
            format!(
                "{} vulnerabilities at or above {} (exit code {})",
                self.findings.len(),
                severity_level,
                self.exit_code
            )
        }
    }
}

#[async_trait]
pub trait VulnerabilityScanner: Send + Sync {
    async fn scan(&self, image: &BuiltImage, options: &ScanOptions) -> Result<ScanReport>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrivyOutput {
    Report {
        #[serde(rename = "Results", default)]
        results: Vec<TrivyResult>,
    },
    Legacy(Vec<TrivyResult>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyResult {
    target: String,
    #[serde(default)]
    vulnerabilities: Option<Vec<Cve>>,
}

/// Trivy の JSON 出力から検出結果を取り出す
///
/// 新しい形式 (`{"Results": [...]}`) と古い形式 (配列) の両方を受け付ける。
pub fn parse_report(output: &str) -> serde_json::Result<Vec<ScanFinding>> {
    if output.trim().is_empty() || output.trim() == "null" {
        return Ok(Vec::new());
    }

    let results = match serde_json::from_str::<TrivyOutput>(output)? {
        TrivyOutput::Report { results } => results,
        TrivyOutput::Legacy(results) => results,
    };

    Ok(results
        .into_iter()
        .flat_map(|result| {
            let target = result.target;
            result
                .vulnerabilities
                .unwrap_or_default()
                .into_iter()
                .map(move |cve| ScanFinding {
                    target: target.clone(),
                    cve,
                })
        })
        .collect())
}

/// Trivy CLI
#[derive(Debug, Clone)]
pub struct TrivyScanner {
    program: String,
    args: Vec<String>,
}

impl Default for TrivyScanner {
    fn default() -> Self {
        Self::new("trivy")
    }
}

impl TrivyScanner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// 空白区切りのコマンドライン (`"docker run --rm aquasec/trivy"`) から作成
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    fn arguments(&self, image: &BuiltImage, options: &ScanOptions) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "image".to_string(),
            "--format".to_string(),
            "json".to_string(),
            "--quiet".to_string(),
            "--no-progress".to_string(),
            "--severity".to_string(),
            options.severity_level.clone(),
            "--vuln-type".to_string(),
            options.vuln_type.clone(),
            "--exit-code".to_string(),
            options.exit_code.to_string(),
            image.reference(),
        ]);
        args
    }
}

#[async_trait]
impl VulnerabilityScanner for TrivyScanner {
    async fn scan(&self, image: &BuiltImage, options: &ScanOptions) -> Result<ScanReport> {
        let args = self.arguments(image, options);
        tracing::info!("Scanning image: {}", image.reference());
        tracing::debug!("Running: {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AssemblyError::Scan(format!("Failed to run {}: {}", self.program, e)))?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = stderr_tail(&output.stderr);

        match parse_report(&stdout) {
            Ok(findings) => Ok(ScanReport::new(exit_code, findings).with_stderr(stderr)),
            Err(e) => Err(AssemblyError::Scan(format!(
                "{} exited with {} and unreadable report ({}): {}",
                self.program,
                exit_code,
                e,
                stderr.trim()
            ))),
        }
    }
}
