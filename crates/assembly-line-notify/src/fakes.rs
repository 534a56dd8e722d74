//! In-memory chat fake (testing only)

use crate::error::{NotifyError, Result};
use crate::message::ChatMessage;
use crate::slack::ChatApi;
use async_trait::async_trait;
use std::sync::Mutex;

/// Records every posted message, or rejects all of them with an API error.
#[derive(Debug, Default)]
pub struct RecordingChat {
    failure: Option<String>,
    messages: Mutex<Vec<ChatMessage>>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: &str) -> Self {
        Self {
            failure: Some(error.to_string()),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn post_message(&self, message: &ChatMessage) -> Result<()> {
        if let Some(error) = &self.failure {
            return Err(NotifyError::ApiError(error.clone()));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}
