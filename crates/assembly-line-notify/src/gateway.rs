use crate::channel::NotifyChannels;
use crate::error::{NotifyError, Result};
use crate::message::{self, ChatMessage};
use crate::slack::ChatApi;
use assembly_line_core::{BuildAction, Cve, FailureKind};
use std::sync::Arc;

/// Formats and dispatches assembly line notifications
///
/// Stateless apart from its configuration. Every method returns an error
/// instead of panicking; callers treat these failures as non-fatal.
#[derive(Clone)]
pub struct NotificationGateway {
    chat: Option<Arc<dyn ChatApi>>,
    channels: NotifyChannels,
}

impl NotificationGateway {
    pub fn new(chat: Arc<dyn ChatApi>, channels: NotifyChannels) -> Self {
        Self {
            chat: Some(chat),
            channels,
        }
    }

    /// Gateway without a chat client; every post fails with `MissingToken`
    pub fn disabled() -> Self {
        Self {
            chat: None,
            channels: NotifyChannels::default(),
        }
    }

    async fn post(&self, message: ChatMessage) -> Result<()> {
        let chat = self.chat.as_ref().ok_or(NotifyError::MissingToken)?;
        chat.post_message(&message).await
    }

    pub async fn notify_build_failed(&self, action: &BuildAction, kind: FailureKind) -> Result<()> {
        let channel = self
            .channels
            .build_failed
            .as_deref()
            .ok_or(NotifyError::MissingChannel("SLACK_CONTAINERS_NOTIFICATION"))?;

        self.post(
            ChatMessage::new(channel, message::build_failed_text(action))
                .with_attachment(message::build_failed_attachment(action, kind)),
        )
        .await
    }

    pub async fn notify_ready_to_deploy(
        &self,
        action: &BuildAction,
        image_name: &str,
        build_time: &str,
        tags: &str,
    ) -> Result<()> {
        let channel = self
            .channels
            .ready_to_deploy
            .as_deref()
            .ok_or(NotifyError::MissingChannel("SLACK_CICD_NOTIFICATION_TEST"))?;

        self.post(
            ChatMessage::new(channel, message::ready_to_deploy_text(action)).with_attachment(
                message::ready_to_deploy_attachment(image_name, build_time, tags, &action.repository),
            ),
        )
        .await
    }

    pub async fn notify_vulnerability(
        &self,
        image_name: &str,
        target: &str,
        cve: &Cve,
        explicit_channel: Option<&str>,
    ) -> Result<()> {
        let channel = self.channels.alerts.select(image_name, explicit_channel)?;
        tracing::debug!("Vulnerability alert channel: {}", channel);

        self.post(
            ChatMessage::new(channel, message::VULNERABILITY_TEXT)
                .with_attachment(message::vulnerability_attachment(image_name, target, cve)),
        )
        .await
    }
}
