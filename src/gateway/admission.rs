//! L2 Admission Controller: size guard, schema validation, model allow-list,
//! and input sanitisation, applied before anything else touches a request.

use crate::gateway::error::GatewayError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MAX_CONTENT_LENGTH: usize = 1024 * 1024;
pub const MAX_MESSAGES: usize = 100;
pub const MAX_MESSAGE_CHARS: usize = 100_000;
pub const MAX_STOP_STRING_CHARS: usize = 1000;
pub const MAX_STOP_ARRAY_LEN: usize = 10;
pub const MAX_TOOLS: usize = 50;
pub const MIN_MAX_TOKENS: u32 = 1;
pub const MAX_MAX_TOKENS: u32 = 128_000;
pub const MAX_BATCH_EVENTS: usize = 100;

static ALLOWED_ROLES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["system", "user", "assistant", "function", "tool"]
        .into_iter()
        .collect()
});

/// Static allow-list of models this deployment is willing to route.
/// Seeded with one representative model per supported provider prefix;
/// deployments extend it via [`ModelAllowList::with_models`].
#[derive(Debug, Clone)]
pub struct ModelAllowList(HashSet<String>);

impl Default for ModelAllowList {
    fn default() -> Self {
        Self(
            [
                "gpt-4o",
                "gpt-4o-mini",
                "gpt-3.5-turbo",
                "claude-3-5-sonnet-latest",
                "claude-3-5-haiku-latest",
                "llama-3.1-70b-versatile",
                "llama-3.1-8b-instant",
                "mixtral-8x7b-32768",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }
}

impl ModelAllowList {
    pub fn with_models(models: impl IntoIterator<Item = String>) -> Self {
        Self(models.into_iter().collect())
    }

    pub fn allows(&self, model: &str) -> bool {
        self.0.contains(model)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StopSequence {
    Single(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub stop: Option<StopSequence>,
    #[serde(default)]
    pub tools: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub tool_choice: Option<serde_json::Value>,
    #[serde(default)]
    pub response_format: Option<serde_json::Value>,
    #[serde(default)]
    pub stream: bool,
}

/// Strips every control character except `\n` and `\t` from `text`.
pub fn sanitize_content(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Validates content length against the 1 MiB ceiling from the raw body size.
pub fn check_content_length(len: usize) -> Result<(), GatewayError> {
    if len > MAX_CONTENT_LENGTH {
        return Err(GatewayError::invalid_request(format!(
            "request body of {len} bytes exceeds the {MAX_CONTENT_LENGTH} byte limit"
        )));
    }
    Ok(())
}

/// Validates and sanitizes a chat completion request in place, returning the
/// sanitized request on success.
pub fn admit_chat_request(
    mut request: ChatCompletionRequest,
    allow_list: &ModelAllowList,
) -> Result<ChatCompletionRequest, GatewayError> {
    if !allow_list.allows(&request.model) {
        return Err(GatewayError::invalid_request(format!(
            "model '{}' is not on the allow-list",
            request.model
        )));
    }
    if request.messages.is_empty() || request.messages.len() > MAX_MESSAGES {
        return Err(GatewayError::invalid_request(format!(
            "messages must contain between 1 and {MAX_MESSAGES} entries"
        )));
    }
    for message in &mut request.messages {
        if !ALLOWED_ROLES.contains(message.role.as_str()) {
            return Err(GatewayError::invalid_request(format!(
                "unsupported message role '{}'",
                message.role
            )));
        }
        if let Some(content) = &message.content {
            if content.chars().count() > MAX_MESSAGE_CHARS {
                return Err(GatewayError::invalid_request(format!(
                    "message content exceeds {MAX_MESSAGE_CHARS} characters"
                )));
            }
            message.content = Some(sanitize_content(content));
        }
    }
    if let Some(temperature) = request.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(GatewayError::invalid_request(
                "temperature must be between 0 and 2",
            ));
        }
    }
    if let Some(max_tokens) = request.max_tokens {
        if !(MIN_MAX_TOKENS..=MAX_MAX_TOKENS).contains(&max_tokens) {
            return Err(GatewayError::invalid_request(format!(
                "max_tokens must be between {MIN_MAX_TOKENS} and {MAX_MAX_TOKENS}"
            )));
        }
    }
    match &request.stop {
        Some(StopSequence::Single(s)) if s.chars().count() > MAX_STOP_STRING_CHARS => {
            return Err(GatewayError::invalid_request(format!(
                "stop string exceeds {MAX_STOP_STRING_CHARS} characters"
            )));
        }
        Some(StopSequence::Many(items)) if items.len() > MAX_STOP_ARRAY_LEN => {
            return Err(GatewayError::invalid_request(format!(
                "stop array exceeds {MAX_STOP_ARRAY_LEN} entries"
            )));
        }
        _ => {}
    }
    if let Some(tools) = &request.tools {
        if tools.len() > MAX_TOOLS {
            return Err(GatewayError::invalid_request(format!(
                "tools array exceeds {MAX_TOOLS} entries"
            )));
        }
    }
    Ok(request)
}

/// Validates an observability event batch: `1..=100` events.
pub fn check_batch_size(count: usize) -> Result<(), GatewayError> {
    if count == 0 || count > MAX_BATCH_EVENTS {
        return Err(GatewayError::invalid_request(format!(
            "event batch must contain between 1 and {MAX_BATCH_EVENTS} events"
        )));
    }
    Ok(())
}
