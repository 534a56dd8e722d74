//! Notification error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Slack bot token is not configured (SLACK_BOT_TOKEN)")]
    MissingToken,

    #[error("No channel to post: {0} is not configured")]
    MissingChannel(&'static str),

    #[error("Slack API error: {0}")]
    ApiError(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
