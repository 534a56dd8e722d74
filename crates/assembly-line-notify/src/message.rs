//! Slack message payloads
//!
//! Attachment layouts for the three message kinds the assembly line posts.

use assembly_line_core::{BuildAction, Cve, FailureKind};
use serde::Serialize;
use serde_json::{Value, json};

const COLOR_DANGER: &str = "#b22222";
const COLOR_GOOD: &str = "good";

/// Button action id consumed by the deploy bot
pub const READY_TO_DEPLOY_ACTION: &str = "ready_to_deploy";

/// `chat.postMessage` request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub channel: String,
    pub text: String,
    pub mrkdwn: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            mrkdwn: true,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub color: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl AttachmentField {
    fn short(title: &str, value: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            value: value.into(),
            short: true,
        }
    }
}

pub fn build_failed_text(action: &BuildAction) -> String {
    format!(
        "<{}|{}> のビルドに失敗しました",
        action.repository_url(),
        action.repository
    )
}

pub fn build_failed_attachment(action: &BuildAction, kind: FailureKind) -> Attachment {
    Attachment {
        color: COLOR_DANGER.to_string(),
        blocks: vec![json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!(
                    "*Action:* <{}|{}>\n*Workflow:* {}\n*Reason:* {}\n",
                    action.run_url(),
                    action.repository,
                    action.workflow,
                    kind
                ),
            }
        })],
        fields: Vec::new(),
    }
}

pub fn ready_to_deploy_text(action: &BuildAction) -> String {
    format!(
        "<{}|{}> のビルドに成功しました",
        action.repository_url(),
        action.repository
    )
}

pub fn ready_to_deploy_attachment(
    image_name: &str,
    build_time: &str,
    tags: &str,
    repository: &str,
) -> Attachment {
    let plain = |text: String| json!({ "type": "plain_text", "text": text, "emoji": true });

    Attachment {
        color: COLOR_GOOD.to_string(),
        blocks: vec![
            json!({
                "type": "section",
                "text": plain(format!(
                    "image-name: {} build-time: {}\ntag: [{}] repo: {}",
                    image_name, build_time, tags, repository
                )),
            }),
            json!({
                "type": "section",
                "text": plain("デプロイしますか？".to_string()),
            }),
            json!({
                "type": "actions",
                "elements": [{
                    "type": "button",
                    "text": plain("デプロイへ".to_string()),
                    "value": format!("{}::{}::{}", repository, image_name, tags),
                    "action_id": READY_TO_DEPLOY_ACTION,
                }],
            }),
        ],
        fields: Vec::new(),
    }
}

pub const VULNERABILITY_TEXT: &str = "ビルドされた Docker イメージに脆弱性が見つかりました。";

pub fn vulnerability_attachment(image_name: &str, target: &str, cve: &Cve) -> Attachment {
    Attachment {
        color: COLOR_DANGER.to_string(),
        blocks: Vec::new(),
        fields: vec![
            AttachmentField::short("Image Name", image_name),
            AttachmentField::short("Target", target),
            AttachmentField::short("Package Name", cve.pkg_name.as_str()),
            AttachmentField::short("CVE", cve.vulnerability_id.as_str()),
            AttachmentField::short("Severity", cve.severity.as_str()),
            AttachmentField::short("Installed Version", format!("\"{}\"", cve.installed_version)),
            AttachmentField::short("Fixed Version", format!("\"{}\"", cve.fixed_version)),
        ],
    }
}

/// Elapsed time as shown in the ready-to-deploy message, e.g. `3min 7sec`
pub fn format_build_time(elapsed: std::time::Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}min {}sec", secs / 60, secs % 60)
}
