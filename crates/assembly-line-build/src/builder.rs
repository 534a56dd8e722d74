use assembly_line_core::{AssemblyError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// エラーメッセージに含める stderr の末尾行数
const STDERR_TAIL_LINES: usize = 20;

/// stderr の末尾 [`STDERR_TAIL_LINES`] 行
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n")
}

/// ビルドツールに渡すパラメータ
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub target: String,
    pub image_name: String,
    pub registry: String,
    pub commit_sha: String,
    pub build_directory: PathBuf,
    pub no_push: bool,
}

/// イメージをビルドする外部ツール
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<()>;
}

/// コマンドライン (`make` など) でビルドする
///
/// `<program> [args..] <target> IMAGE_NAME=.. REGISTRY_NAME=.. COMMIT_HASH=..` を
/// `build_directory` で実行する。
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
    args: Vec<String>,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new("make")
    }
}

impl CommandBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// 空白区切りのコマンドライン (`"make -f Makefile.ci"`) から作成
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    fn arguments(&self, request: &BuildRequest) -> Vec<String> {
        let mut args = self.args.clone();
        if !request.target.is_empty() {
            args.push(request.target.clone());
        }
        args.push(format!("IMAGE_NAME={}", request.image_name));
        args.push(format!("REGISTRY_NAME={}", request.registry));
        args.push(format!("COMMIT_HASH={}", request.commit_sha));
        args
    }
}

#[async_trait]
impl ImageBuilder for CommandBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<()> {
        let args = self.arguments(request);
        tracing::info!("Building image: {}", request.image_name);
        tracing::debug!(
            "Running: {} {} (in {})",
            self.program,
            args.join(" "),
            request.build_directory.display()
        );

        let child = Command::new(&self.program)
            .args(&args)
            .current_dir(&request.build_directory)
            .env("NO_PUSH", request.no_push.to_string())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AssemblyError::Build(format!("Failed to run {}: {}", self.program, e))
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AssemblyError::Build(format!("{} did not finish: {}", self.program, e)))?;

        if !output.status.success() {
            let tail = stderr_tail(&output.stderr);
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(AssemblyError::Build(format!(
                "{} exited with {}\n{}",
                self.program, code, tail
            )));
        }

        tracing::info!("Successfully built: {}", request.image_name);
        Ok(())
    }
}
