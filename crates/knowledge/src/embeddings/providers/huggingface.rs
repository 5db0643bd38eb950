//! Hugging Face hosted inference embeddings.
//!
//! Posts `{"inputs": text, "options": {"wait_for_model": true}}` to the
//! model's feature-extraction endpoint. Depending on the model and API
//! version the vector comes back flat, nested one level, or wrapped in an
//! object; [`normalize_embedding`] accepts all of them.

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use insight_core::{AppError, AppResult};
use insight_llm::http::{send_error, status_error};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const SERVICE: &str = "embedding";

#[derive(Debug, Clone)]
pub struct HuggingFaceProvider {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    inputs: &'a str,
    options: InferenceOptions,
}

impl HuggingFaceProvider {
    pub fn new(
        endpoint: String,
        model: String,
        dimensions: usize,
        api_key: Option<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::Embedding(format!("Failed to create HTTP client for embeddings: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint,
            model,
            dimensions,
            api_key,
        })
    }
}

/// Extract a vector from any of the accepted reply shapes:
/// `[f, ...]`, `[[f, ...], ...]`, `[{"embedding": [...]}, ...]` and
/// `{"embedding": [...]}`. Anything else, including non-numeric entries,
/// is `None`.
pub fn normalize_embedding(body: &Value) -> Option<Vec<f32>> {
    match body {
        Value::Array(items) => match items.first()? {
            Value::Number(_) => numbers(items),
            Value::Array(row) => numbers(row),
            Value::Object(record) => match record.get("embedding")? {
                Value::Array(row) => numbers(row),
                _ => None,
            },
            _ => None,
        },
        Value::Object(record) => match record.get("embedding")? {
            Value::Array(row) => numbers(row),
            _ => None,
        },
        _ => None,
    }
}

fn numbers(items: &[Value]) -> Option<Vec<f32>> {
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| item.as_f64().map(|f| f as f32))
        .collect()
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceProvider {
    fn provider_name(&self) -> &str {
        "huggingface"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    async fn embed_once(&self, text: &str) -> AppResult<Vec<f32>> {
        let request = EmbeddingRequest {
            inputs: text,
            options: InferenceOptions {
                wait_for_model: true,
            },
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| send_error(SERVICE, e))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(SERVICE, status, body));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::Embedding(format!("Failed to parse embedding response: {}", e))
        })?;

        let embedding = normalize_embedding(&body).ok_or_else(|| {
            AppError::Embedding(format!(
                "Unexpected embedding response format: {}",
                preview(&body)
            ))
        })?;

        if embedding.len() != self.dimensions {
            return Err(AppError::Embedding(format!(
                "Unexpected embedding dimensions: got {}, expected {}",
                embedding.len(),
                self.dimensions
            )));
        }

        debug!("Generated {} dimensional embedding", embedding.len());
        Ok(embedding)
    }
}

fn preview(body: &Value) -> String {
    let text = body.to_string();
    match text.char_indices().nth(120) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_accepted_shapes() {
        let expected = Some(vec![0.5, -1.0, 2.0]);
        assert_eq!(normalize_embedding(&json!([0.5, -1.0, 2.0])), expected);
        assert_eq!(
            normalize_embedding(&json!([[0.5, -1.0, 2.0], [9.0, 9.0, 9.0]])),
            expected
        );
        assert_eq!(
            normalize_embedding(&json!([{"embedding": [0.5, -1.0, 2.0]}])),
            expected
        );
        assert_eq!(
            normalize_embedding(&json!({"embedding": [0.5, -1.0, 2.0]})),
            expected
        );
    }

    #[test]
    fn test_normalize_rejects_other_shapes() {
        assert_eq!(normalize_embedding(&json!([])), None);
        assert_eq!(normalize_embedding(&json!({"error": "loading"})), None);
        assert_eq!(normalize_embedding(&json!("0.5")), None);
        assert_eq!(normalize_embedding(&json!([["a", "b"]])), None);
        assert_eq!(normalize_embedding(&json!([0.5, "x"])), None);
        assert_eq!(normalize_embedding(&json!({"embedding": "nope"})), None);
    }

    #[test]
    fn test_request_payload() {
        let request = EmbeddingRequest {
            inputs: "rafts were late",
            options: InferenceOptions {
                wait_for_model: true,
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"inputs": "rafts were late", "options": {"wait_for_model": true}})
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let provider = HuggingFaceProvider::new(
            "http://127.0.0.1:9/models/test".into(),
            "test".into(),
            4,
            None,
            Duration::from_secs(2),
        )
        .unwrap();

        let err = provider.embed_once("hello").await.unwrap_err();
        assert!(err.is_transient(), "expected transient error, got {}", err);
    }
}
