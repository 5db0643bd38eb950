//! Generator provider factory.
//!
//! Resolves a provider name from the configuration into a client.

use crate::client::LlmClient;
use crate::providers::ChatCompletionsClient;
use std::sync::Arc;
use std::time::Duration;

/// Create a generator client.
///
/// # Arguments
/// * `provider` - Provider identifier ("chat-completions", "huggingface", "openai")
/// * `endpoint` - Completion endpoint URL
/// * `api_key` - Bearer token, if the endpoint needs one
/// * `timeout` - Per-request timeout
///
/// # Errors
/// Returns an error if the provider is unknown or the endpoint is empty.
pub fn create_client(
    provider: &str,
    endpoint: &str,
    api_key: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn LlmClient>, String> {
    if endpoint.trim().is_empty() {
        return Err("Generator endpoint is not configured".to_string());
    }

    match provider.to_lowercase().as_str() {
        "chat-completions" | "huggingface" | "openai" => {
            if api_key.is_none() {
                tracing::warn!("No API token configured for provider {}", provider);
            }
            let client = ChatCompletionsClient::with_options(
                endpoint,
                api_key.map(str::to_string),
                timeout,
            )
            .map_err(|e| e.to_string())?;
            Ok(Arc::new(client))
        }
        _ => Err(format!("Unknown provider: {}", provider)),
    }
}
