//! Image Assembly Line core
//!
//! ビルド・スキャン・プッシュ・通知の各クレートが共有するデータモデルと、
//! 実行失敗を分類するエラー体系を提供します。

pub mod error;
pub mod model;

pub use error::{AssemblyError, FailureKind, Result};
pub use model::{BuildAction, BuildOutcome, BuiltImage, Cve, ImageRecord, LATEST_TAG};
