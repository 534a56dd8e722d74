//! ログ出力の初期化と CI 向けの注釈

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` をもとにしたフィルター。`debug` なら debug 以上を追加で出す
pub fn env_filter(debug: bool) -> EnvFilter {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if debug {
        filter.add_directive(tracing::Level::DEBUG.into())
    } else {
        filter
    }
}

/// stderr へのログ出力を初期化する（stdout は CI への注釈に使う）
pub fn init(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// CI ランナーにエラーとして表示させる `::error::` 行
pub fn error_annotation(message: &str) -> String {
    let escaped = message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A");
    format!("::error::{}", escaped)
}
