//! Generator integration for Trainer Insight.
//!
//! A provider-agnostic client trait for chat-style text generation, an
//! OpenAI-compatible chat-completions provider, and retry helpers shared
//! with the embedding backends.
//!
//! # Example
//! ```no_run
//! use insight_core::RetryPolicy;
//! use insight_llm::{complete_with_retry, providers::ChatCompletionsClient, LlmRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ChatCompletionsClient::new("https://router.huggingface.co/v1/chat/completions")?;
//! let request = LlmRequest::new("Summarize the feedback", "meta-llama/Llama-3.1-8B-Instruct");
//! let response = complete_with_retry(&client, &request, &RetryPolicy::default()).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod http;
pub mod providers;
pub mod retry;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::ChatCompletionsClient;
pub use retry::complete_with_retry;
