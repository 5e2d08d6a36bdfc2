//! Slack block-kit payload construction and webhook delivery for evaluation
//! alerts and the `/integrations/slack` probe route. Actual message delivery
//! is an external collaborator; this module only builds the payload and
//! performs the webhook POST.

use crate::logging::log_warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    Header {
        text: SlackText,
    },
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<SlackText>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<SlackText>>,
    },
    Context {
        elements: Vec<SlackText>,
    },
    Actions {
        elements: Vec<serde_json::Value>,
    },
    Divider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackText {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl SlackText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: "plain_text".to_string(),
            text: text.into(),
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            kind: "mrkdwn".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackAttachment {
    pub color: String,
    pub footer: String,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackMessage {
    pub blocks: Vec<SlackBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<SlackAttachment>>,
}

/// Builds the alert message for a rule set that crossed its pass-rate
/// threshold.
pub fn alert_message(
    rule_set_name: &str,
    project_id: &str,
    pass_rate: f64,
    sample_count: usize,
    threshold: f64,
) -> SlackMessage {
    SlackMessage {
        blocks: vec![
            SlackBlock::Header {
                text: SlackText::plain(format!("Evaluation alert: {rule_set_name}")),
            },
            SlackBlock::Section {
                text: Some(SlackText::markdown(format!(
                    "Pass rate *{:.1}%* fell below the configured threshold of *{:.1}%* \
                     over the last {sample_count} samples.",
                    pass_rate * 100.0,
                    threshold * 100.0
                ))),
                fields: None,
            },
            SlackBlock::Context {
                elements: vec![SlackText::markdown(format!("project: `{project_id}`"))],
            },
        ],
        attachments: Some(vec![SlackAttachment {
            color: "#e01e5a".to_string(),
            footer: "evaluation-pipeline".to_string(),
            ts: chrono::Utc::now().timestamp(),
        }]),
    }
}

/// POSTs `message` to `webhook_url`. Success iff the response is 2xx.
pub async fn send(
    http: &reqwest::Client,
    webhook_url: &str,
    message: &SlackMessage,
) -> Result<(), String> {
    let response = http
        .post(webhook_url)
        .json(message)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        let status = response.status();
        log_warn!(status = %status, "slack webhook delivery failed");
        return Err(format!("slack webhook responded with status {status}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_message_has_header_and_divider_free_structure() {
        let message = alert_message("pii-guard", "proj_1", 0.5, 20, 0.9);
        assert_eq!(message.blocks.len(), 3);
        assert!(message.attachments.is_some());
    }
}
