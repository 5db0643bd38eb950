//! Generator client abstraction and request/response types.

use insight_core::AppResult;
use serde::{Deserialize, Serialize};

/// Chat completion request.
///
/// `system` and `prompt` become the system and user messages of the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// User message
    pub prompt: String,

    /// Model identifier
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            system: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text. Empty when the provider's reply carried no message.
    pub content: String,

    pub model: String,

    pub usage: LlmUsage,

    /// Whether the reply had the expected structure
    #[serde(default = "default_true")]
    pub done: bool,
}

fn default_true() -> bool {
    true
}

impl LlmResponse {
    /// True when the reply carries usable text.
    pub fn has_content(&self) -> bool {
        self.done && !self.content.trim().is_empty()
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,

    #[serde(default)]
    pub completion_tokens: u32,

    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Trait for generator providers.
///
/// Implementations classify failures: `AppError::Transient` for failures a
/// retry may fix, `AppError::Status` for error codes, `AppError::Llm` for
/// everything else.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g. "chat-completions").
    fn provider_name(&self) -> &str;

    /// Perform a single, non-streaming completion.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}
