//! L6 Upstream Dispatcher: provider selection by model prefix, buffered
//! forwarding through the existing provider family, and a streaming path
//! built directly over `reqwest`'s response byte stream.

use crate::config::{AnthropicConfig, DefaultLLMParams, GroqConfig, LLMConfig, OpenAIConfig};
use crate::messages::{MessageContent, MessageRole, UnifiedLLMRequest, UnifiedMessage};
use crate::provider::{LlmProvider, RequestConfig, Response};
use crate::gateway::admission::{ChatCompletionRequest, StopSequence};
use crate::gateway::config::ProvidersConfig;
use crate::gateway::error::GatewayError;
use crate::internals::retry::{RetryExecutor, RetryPolicy};
use crate::logging::log_warn;
use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Groq,
}

impl ProviderKind {
    /// `gpt-*` -> OpenAI, `claude-*` -> Anthropic, `llama-*`/`mixtral-*` -> Groq.
    pub fn from_model(model: &str) -> Result<Self, GatewayError> {
        if model.starts_with("gpt-") {
            Ok(Self::OpenAI)
        } else if model.starts_with("claude-") {
            Ok(Self::Anthropic)
        } else if model.starts_with("llama-") || model.starts_with("mixtral-") {
            Ok(Self::Groq)
        } else {
            Err(GatewayError::invalid_request(format!(
                "no provider mapping for model '{model}'"
            )))
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Groq => "groq",
        }
    }
}

/// The dispatcher's retry policy, reproducing the 50ms/250ms sequence with
/// at most two attempts.
fn dispatcher_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(250),
        backoff_multiplier: 5.0,
        total_timeout: Duration::from_secs(30),
        request_timeout: Duration::from_secs(60),
    }
}

/// Builds one [`UnifiedLLMClient`] per supported provider and a raw HTTP
/// client used for the streaming path, which talks to upstream directly
/// rather than through the buffered provider abstraction.
pub struct Dispatcher {
    openai: crate::client::UnifiedLLMClient,
    anthropic: crate::client::UnifiedLLMClient,
    groq: crate::client::UnifiedLLMClient,
    http: reqwest::Client,
    providers: ProvidersConfig,
}

impl Dispatcher {
    pub fn new(providers: ProvidersConfig, default_params: DefaultLLMParams) -> Result<Self, GatewayError> {
        let openai = crate::client::UnifiedLLMClient::from_config(LLMConfig {
            provider: Box::new(OpenAIConfig {
                api_key: providers.openai.api_key.clone(),
                base_url: providers
                    .openai
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com".to_string()),
                ..Default::default()
            }),
            default_params: default_params.clone(),
        })
        .map_err(GatewayError::from)?;

        let anthropic = crate::client::UnifiedLLMClient::from_config(LLMConfig {
            provider: Box::new(AnthropicConfig {
                api_key: providers.anthropic.api_key.clone(),
                base_url: providers
                    .anthropic
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
                ..Default::default()
            }),
            default_params: default_params.clone(),
        })
        .map_err(GatewayError::from)?;

        let groq = crate::client::UnifiedLLMClient::from_config(LLMConfig {
            provider: Box::new(GroqConfig {
                api_key: providers.groq.api_key.clone(),
                base_url: providers
                    .groq
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.groq.com".to_string()),
                ..Default::default()
            }),
            default_params,
        })
        .map_err(GatewayError::from)?;

        Ok(Self {
            openai,
            anthropic,
            groq,
            http: reqwest::Client::new(),
            providers,
        })
    }

    /// Forwards a validated, possibly A/B-rewritten chat request and awaits
    /// the full response. Retries idempotent 5xx/network errors at most
    /// twice with 50ms/250ms backoff; 4xx is never retried.
    pub async fn dispatch_buffered(
        &self,
        model: &str,
        request: &ChatCompletionRequest,
        config: Option<RequestConfig>,
    ) -> Result<(Response, ProviderKind), GatewayError> {
        let kind = ProviderKind::from_model(model)?;
        let unified_request = to_unified_request(request, model);

        let client = match kind {
            ProviderKind::OpenAI => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Groq => &self.groq,
        };

        let mut executor = RetryExecutor::new(dispatcher_retry_policy());
        let response = executor
            .execute(|| {
                let unified_request = unified_request.clone();
                let config = config.clone();
                async move { client.execute_llm(unified_request, None, config).await }
            })
            .await
            .map_err(GatewayError::from)?;

        Ok((response, kind))
    }

    /// Streams from the upstream's OpenAI-compatible SSE endpoint and to the
    /// client simultaneously. Back-pressure is inherited from the underlying
    /// byte stream: nothing is buffered beyond one in-flight HTTP chunk.
    pub fn dispatch_streaming(
        &self,
        model: &str,
        request: &ChatCompletionRequest,
    ) -> Result<impl Stream<Item = Result<StreamEvent, GatewayError>>, GatewayError> {
        let kind = ProviderKind::from_model(model)?;
        if kind == ProviderKind::Anthropic {
            return Err(GatewayError::invalid_request(
                "streaming is not supported for Anthropic models: the wire format differs from the OpenAI-compatible SSE this dispatcher speaks",
            ));
        }
        let endpoint = self.provider_endpoint(kind)?;
        let body = to_openai_wire_request(request, model, true);
        let http = self.http.clone();

        Ok(try_stream! {
            let response = http
                .post(&endpoint.url)
                .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", endpoint.api_key))
                .json(&body)
                .send()
                .await
                .map_err(|e| GatewayError::upstream_unreachable(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                Err(GatewayError::provider_error(text, status))?;
            }

            let mut bytes_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes_stream.next().await {
                let chunk = chunk.map_err(|e| GatewayError::upstream_unreachable(e.to_string()))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(frame_end) = buffer.find("\n\n") {
                    let frame = buffer[..frame_end].to_string();
                    buffer.drain(..frame_end + 2);
                    if let Some(data) = frame.strip_prefix("data: ").or_else(|| frame.strip_prefix("data:")) {
                        let data = data.trim();
                        if data == "[DONE]" {
                            yield StreamEvent::Done;
                            return;
                        }
                        yield StreamEvent::Chunk(data.to_string());
                    }
                }
            }
            yield StreamEvent::Done;
        })
    }

    fn provider_endpoint(&self, kind: ProviderKind) -> Result<ResolvedEndpoint, GatewayError> {
        let (base_url, api_key, path) = match kind {
            ProviderKind::OpenAI => (
                self.providers
                    .openai
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com".to_string()),
                self.providers.openai.api_key.clone(),
                "/v1/chat/completions",
            ),
            ProviderKind::Anthropic => (
                self.providers
                    .anthropic
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
                self.providers.anthropic.api_key.clone(),
                "/v1/messages",
            ),
            ProviderKind::Groq => (
                self.providers
                    .groq
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.groq.com".to_string()),
                self.providers.groq.api_key.clone(),
                "/openai/v1/chat/completions",
            ),
        };
        let api_key = api_key.ok_or_else(|| {
            GatewayError::internal(format!("no API key configured for provider {}", kind.name()))
        })?;
        Ok(ResolvedEndpoint {
            url: format!("{base_url}{path}"),
            api_key,
        })
    }
}

struct ResolvedEndpoint {
    url: String,
    api_key: String,
}

/// One normalized event out of the streaming path: a forwarded JSON chunk or
/// the terminal marker.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Chunk(String),
    Done,
}

/// Best-effort extraction of the incremental text from one OpenAI-shaped
/// streaming chunk, for the token-estimate accounting done once a stream
/// completes (no provider-reported usage frame is available mid-stream).
pub fn extract_chunk_text(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

fn stop_to_vec(stop: &Option<StopSequence>) -> Option<Vec<String>> {
    match stop {
        None => None,
        Some(StopSequence::Single(s)) => Some(vec![s.clone()]),
        Some(StopSequence::Many(items)) => Some(items.clone()),
    }
}

fn to_unified_request(request: &ChatCompletionRequest, model: &str) -> UnifiedLLMRequest {
    let messages = request
        .messages
        .iter()
        .map(|m| {
            let role = match m.role.as_str() {
                "system" => MessageRole::System,
                "assistant" => MessageRole::Assistant,
                "tool" | "function" => MessageRole::Tool,
                _ => MessageRole::User,
            };
            UnifiedMessage::new(
                role,
                MessageContent::Text(m.content.clone().unwrap_or_default()),
            )
        })
        .collect();

    let mut unified = UnifiedLLMRequest::new(messages);
    unified.config = Some(RequestConfig {
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        top_p: request.top_p,
        ..Default::default()
    });
    let _ = model;
    unified
}

/// Builds the raw OpenAI-compatible wire body used by the streaming path
/// (OpenAI and Groq speak this natively; Anthropic streaming is out of scope
/// for the normalized SSE path and is served buffered-only for now).
fn to_openai_wire_request(
    request: &ChatCompletionRequest,
    model: &str,
    stream: bool,
) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role,
                "content": m.content.clone().unwrap_or_default(),
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": stream,
    });
    if let Some(temperature) = request.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(top_p) = request.top_p {
        body["top_p"] = serde_json::json!(top_p);
    }
    if let Some(stop) = stop_to_vec(&request.stop) {
        body["stop"] = serde_json::json!(stop);
    }
    if let Some(tools) = &request.tools {
        body["tools"] = serde_json::json!(tools);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_maps_model_prefixes() {
        assert_eq!(ProviderKind::from_model("gpt-4o").unwrap(), ProviderKind::OpenAI);
        assert_eq!(
            ProviderKind::from_model("claude-3-5-sonnet-latest").unwrap(),
            ProviderKind::Anthropic
        );
        assert_eq!(
            ProviderKind::from_model("llama-3.1-70b-versatile").unwrap(),
            ProviderKind::Groq
        );
        assert_eq!(
            ProviderKind::from_model("mixtral-8x7b-32768").unwrap(),
            ProviderKind::Groq
        );
        assert!(ProviderKind::from_model("unknown-model").is_err());
    }

    #[test]
    fn extracts_delta_content_from_openai_shaped_chunk() {
        let chunk = r#"{"choices":[{"delta":{"content":"hel"}}]}"#;
        assert_eq!(extract_chunk_text(chunk).as_deref(), Some("hel"));
    }

    #[test]
    fn missing_delta_content_yields_none() {
        let chunk = r#"{"choices":[{"delta":{}}]}"#;
        assert_eq!(extract_chunk_text(chunk), None);
        assert_eq!(extract_chunk_text("not json"), None);
    }

    fn test_dispatcher() -> Dispatcher {
        let providers = ProvidersConfig {
            openai: crate::gateway::config::ProviderEndpoint {
                base_url: None,
                api_key: Some("test-key".to_string()),
            },
            anthropic: crate::gateway::config::ProviderEndpoint {
                base_url: None,
                api_key: Some("test-key".to_string()),
            },
            groq: crate::gateway::config::ProviderEndpoint {
                base_url: None,
                api_key: Some("test-key".to_string()),
            },
        };
        Dispatcher::new(providers, DefaultLLMParams::default()).unwrap()
    }

    #[test]
    fn anthropic_streaming_is_rejected_before_any_upstream_call() {
        let dispatcher = test_dispatcher();
        let request = ChatCompletionRequest {
            model: "claude-3-5-sonnet-latest".to_string(),
            messages: vec![crate::gateway::admission::InboundMessage {
                role: "user".to_string(),
                content: Some("hi".to_string()),
            }],
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop: None,
            tools: None,
            tool_choice: None,
            response_format: None,
            stream: true,
        };
        let err = dispatcher
            .dispatch_streaming("claude-3-5-sonnet-latest", &request)
            .err()
            .expect("anthropic streaming must be rejected up front");
        assert_eq!(err.error_type(), "invalid_request");
    }
}
