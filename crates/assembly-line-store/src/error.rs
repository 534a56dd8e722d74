//! Record store error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("S3 error ({bucket}/{key}): {message}")]
    S3 {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Invalid record key: {0}")]
    InvalidKey(String),

    #[error("JSON serialize error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
