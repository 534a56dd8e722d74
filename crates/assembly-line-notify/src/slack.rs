//! Slack Web API client
//!
//! Posts messages with `chat.postMessage` using a bot token.

use crate::error::{NotifyError, Result};
use crate::message::ChatMessage;
use async_trait::async_trait;
use serde::Deserialize;

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Chat system the gateway posts to
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn post_message(&self, message: &ChatMessage) -> Result<()>;
}

pub struct SlackClient {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(NotifyError::MissingToken);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            token,
            api_base: SLACK_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API host (e.g. an enterprise proxy)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn post_message(&self, message: &ChatMessage) -> Result<()> {
        let url = format!("{}/chat.postMessage", self.api_base);
        tracing::debug!("Posting Slack message to {}", message.channel);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(message)
            .send()
            .await?
            .error_for_status()?;

        let api_response: ApiResponse = response.json().await?;
        if !api_response.ok {
            return Err(NotifyError::ApiError(
                api_response
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        Ok(())
    }
}
