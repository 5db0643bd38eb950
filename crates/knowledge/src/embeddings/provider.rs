//! Embedding provider trait and factory.

use insight_core::config::EmbeddingSettings;
use insight_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// A backend that turns one text into one vector.
///
/// Providers make a single attempt and report failures as errors; retries,
/// rate limiting and the zero-vector fallback live in
/// [`EmbeddingGateway`](super::EmbeddingGateway).
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// e.g. "huggingface", "hashing"
    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Embed one text. Transient failures must be `AppError::Transient`.
    async fn embed_once(&self, text: &str) -> AppResult<Vec<f32>>;
}

/// Create an embedding provider from configuration.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_key: Option<String>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.as_str() {
        "huggingface" => {
            let provider = super::providers::huggingface::HuggingFaceProvider::new(
                settings.endpoint(),
                settings.model.clone(),
                settings.dimensions,
                api_key,
                Duration::from_secs(settings.timeout_secs),
            )?;
            Ok(Arc::new(provider))
        }

        "hashing" => {
            let provider = super::providers::hashing::HashingProvider::new(settings.dimensions);
            Ok(Arc::new(provider))
        }

        other => Err(AppError::Embedding(format!(
            "Unknown embedding provider: '{}'. Supported providers: huggingface, hashing",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_hashing_provider() {
        let settings = EmbeddingSettings {
            provider: "hashing".to_string(),
            dimensions: 64,
            ..Default::default()
        };

        let provider = create_provider(&settings, None).unwrap();
        assert_eq!(provider.provider_name(), "hashing");
        assert_eq!(provider.dimensions(), 64);
    }

    #[test]
    fn test_create_huggingface_provider() {
        let settings = EmbeddingSettings::default();
        let provider = create_provider(&settings, Some("hf_test".into())).unwrap();
        assert_eq!(provider.provider_name(), "huggingface");
        assert_eq!(provider.model_name(), settings.model);
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_unknown_provider() {
        let settings = EmbeddingSettings {
            provider: "word2vec".to_string(),
            ..Default::default()
        };

        let err = create_provider(&settings, None).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }
}
