//! OpenAI-compatible chat-completions provider.
//!
//! Works against any endpoint speaking the `/v1/chat/completions` protocol,
//! including the Hugging Face inference router.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::http::{send_error, status_error};
use insight_core::{AppError, AppResult};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

/// Chat-completions client.
pub struct ChatCompletionsClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(endpoint: impl Into<String>) -> AppResult<Self> {
        Self::with_options(endpoint, None, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_options(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            client,
        })
    }

    fn to_chat_request<'a>(&self, request: &'a LlmRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
        }
    }
}

/// Convert a chat-completions reply body into an `LlmResponse`.
///
/// A body without `choices[0].message.content` yields an empty, not-done
/// response rather than an error: the caller decides what to show.
pub fn parse_chat_reply(body: &Value, requested_model: &str) -> LlmResponse {
    let content = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str);

    let usage = body
        .get("usage")
        .map(|usage| {
            let field = |name: &str| {
                usage
                    .get(name)
                    .and_then(Value::as_u64)
                    .unwrap_or(0)
                    .min(u32::MAX as u64) as u32
            };
            LlmUsage::new(field("prompt_tokens"), field("completion_tokens"))
        })
        .unwrap_or_default();

    let model = body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(requested_model)
        .to_string();

    match content {
        Some(text) => LlmResponse {
            content: text.trim().to_string(),
            model,
            usage,
            done: true,
        },
        None => {
            error!("Unexpected chat-completions reply format: {}", body);
            LlmResponse {
                content: String::new(),
                model,
                usage,
                done: false,
            }
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for ChatCompletionsClient {
    fn provider_name(&self) -> &str {
        "chat-completions"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        info!("Sending chat completion request");
        debug!(prompt_chars = request.prompt.len(), "Request prepared");

        let mut builder = self
            .client
            .post(&self.endpoint)
            .json(&self.to_chat_request(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| send_error("generator", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = status.as_u16(), "Generator returned an error status");
            return Err(status_error("generator", status, body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse generator reply: {}", e)))?;

        let parsed = parse_chat_reply(&body, &request.model);
        info!(
            completion_tokens = parsed.usage.completion_tokens,
            "Received chat completion"
        );
        Ok(parsed)
    }
}
