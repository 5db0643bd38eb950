//! Embedding gateway.
//!
//! Wraps an [`EmbeddingProvider`] with retries, rate limiting and a typed
//! fallback: a text that cannot be embedded becomes
//! [`Embedding::DegradedFallback`] instead of failing the whole batch.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use crate::progress::ProgressReporter;
use insight_core::config::EmbeddingSettings;
use insight_core::{AppError, AppResult, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Batches report progress every this many texts.
const PROGRESS_INTERVAL: usize = 10;

/// Result of embedding one text.
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    Embedded(Vec<f32>),
    /// Zero vector of the configured dimension, used after retries ran out
    /// or the backend failed for good
    DegradedFallback(Vec<f32>),
}

impl Embedding {
    pub fn vector(&self) -> &[f32] {
        match self {
            Embedding::Embedded(v) | Embedding::DegradedFallback(v) => v,
        }
    }

    pub fn into_vector(self) -> Vec<f32> {
        match self {
            Embedding::Embedded(v) | Embedding::DegradedFallback(v) => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Embedding::DegradedFallback(_))
    }
}

/// Retrying, rate-limited access to an embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    inter_call_delay: Duration,
}

impl EmbeddingGateway {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        retry: RetryPolicy,
        inter_call_delay: Duration,
    ) -> Self {
        Self {
            provider,
            retry,
            inter_call_delay,
        }
    }

    /// Build the configured provider and wrap it.
    pub fn from_settings(settings: &EmbeddingSettings) -> AppResult<Self> {
        let provider = create_provider(settings, settings.api_key())?;
        Ok(Self::new(
            provider,
            settings.retry,
            Duration::from_millis(settings.inter_call_delay_ms),
        ))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed one text. Never fails: the result always has the configured
    /// dimension, degraded to zeros when the provider could not deliver.
    pub async fn embed(&self, text: &str) -> Embedding {
        let mut attempt = 0;

        loop {
            match self.attempt(text).await {
                Ok(vector) => return Embedding::Embedded(vector),
                Err(e) if e.is_transient() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Embedding backend unavailable, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        provider = self.provider.provider_name(),
                        attempts = attempt + 1,
                        "Embedding failed, using zero vector: {}",
                        e
                    );
                    return Embedding::DegradedFallback(vec![0.0; self.dimensions()]);
                }
            }
        }
    }

    async fn attempt(&self, text: &str) -> AppResult<Vec<f32>> {
        let vector = self.provider.embed_once(text).await?;
        if vector.len() != self.dimensions() {
            return Err(AppError::Embedding(format!(
                "Provider '{}' returned {} dimensions, expected {}",
                self.provider.provider_name(),
                vector.len(),
                self.dimensions()
            )));
        }
        Ok(vector)
    }

    /// Embed a search query. A degraded or all-zero vector would match
    /// nothing meaningfully, so both are errors here.
    pub async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        match self.embed(text).await {
            Embedding::Embedded(vector) if vector.iter().any(|x| *x != 0.0) => Ok(vector),
            Embedding::Embedded(_) => Err(AppError::Embedding(
                "Query embedding is a zero vector".to_string(),
            )),
            Embedding::DegradedFallback(_) => Err(AppError::Embedding(
                "Failed to generate query embedding".to_string(),
            )),
        }
    }

    /// Embed texts one at a time, in order, pausing between calls. One
    /// failing text never aborts the batch.
    pub async fn embed_batch(&self, texts: &[String], progress: &ProgressReporter) -> Vec<Embedding> {
        let total = texts.len();
        info!(
            texts = total,
            provider = self.provider.provider_name(),
            model = self.provider.model_name(),
            "Embedding batch"
        );

        let mut embeddings = Vec::with_capacity(total);
        for (i, text) in texts.iter().enumerate() {
            if i > 0 && !self.inter_call_delay.is_zero() {
                tokio::time::sleep(self.inter_call_delay).await;
            }

            embeddings.push(self.embed(text).await);

            let done = i + 1;
            if done % PROGRESS_INTERVAL == 0 || done == total {
                debug!("Embedded {}/{} texts", done, total);
                progress.embed(done as u64, total as u64, self.provider.model_name());
            }
        }

        let degraded = embeddings.iter().filter(|e| e.is_degraded()).count();
        if degraded > 0 {
            warn!(degraded, total, "Some texts fell back to zero vectors");
        }

        embeddings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::HashingProvider;
    use crate::progress::ProgressEvent;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Provider whose first `failures` calls fail with a scripted error.
    #[derive(Debug)]
    struct ScriptedProvider {
        dimensions: usize,
        failures: u32,
        transient: bool,
        reply_dimensions: usize,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(dimensions: usize, failures: u32, transient: bool) -> Self {
            Self {
                dimensions,
                failures,
                transient,
                reply_dimensions: dimensions,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        fn model_name(&self) -> &str {
            "scripted-v1"
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed_once(&self, _text: &str) -> AppResult<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(if self.transient {
                    AppError::Transient("model loading".into())
                } else {
                    AppError::Status {
                        service: "embedding".into(),
                        status: 400,
                        message: "bad input".into(),
                    }
                });
            }
            Ok(vec![0.25; self.reply_dimensions])
        }
    }

    fn gateway(provider: Arc<ScriptedProvider>, attempts: u32) -> EmbeddingGateway {
        EmbeddingGateway::new(provider, RetryPolicy::immediate(attempts), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let provider = Arc::new(ScriptedProvider::new(8, 2, true));
        let result = gateway(provider.clone(), 3).embed("text").await;

        assert_eq!(result, Embedding::Embedded(vec![0.25; 8]));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_persistent_failure_degrades_to_zero_vector() {
        let provider = Arc::new(ScriptedProvider::new(384, u32::MAX, true));
        let result = gateway(provider.clone(), 3).embed("text").await;

        assert!(result.is_degraded());
        assert_eq!(result.vector().len(), 384);
        assert!(result.vector().iter().all(|x| *x == 0.0));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_final_error_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(8, 1, false));
        let result = gateway(provider.clone(), 3).embed("text").await;

        assert!(result.is_degraded());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_wrong_dimension_degrades() {
        let provider = Arc::new(ScriptedProvider {
            reply_dimensions: 5,
            ..ScriptedProvider::new(8, 0, true)
        });
        let result = gateway(provider.clone(), 3).embed("text").await;

        assert!(result.is_degraded());
        assert_eq!(result.vector().len(), 8);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_embed_query_rejects_fallback() {
        let provider = Arc::new(ScriptedProvider::new(8, u32::MAX, true));
        let err = gateway(provider, 2).embed_query("challenges").await.unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_embed_query_rejects_zero_vector() {
        let gateway = EmbeddingGateway::new(
            Arc::new(HashingProvider::new(16)),
            RetryPolicy::immediate(1),
            Duration::ZERO,
        );
        assert!(gateway.embed_query("?!").await.is_err());
        assert_eq!(gateway.embed_query("seaweed").await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures_and_reports_progress() {
        // First text exhausts its two attempts, everything after succeeds.
        let provider = Arc::new(ScriptedProvider::new(4, 2, true));
        let gateway = gateway(provider, 2);

        let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let progress = ProgressReporter::new(Arc::new(move |e| sink.lock().unwrap().push(e)));

        let texts: Vec<String> = (0..25).map(|i| format!("text {}", i)).collect();
        let embeddings = gateway.embed_batch(&texts, &progress).await;

        assert_eq!(embeddings.len(), 25);
        assert!(embeddings[0].is_degraded());
        assert!(embeddings[1..].iter().all(|e| !e.is_degraded()));

        let currents: Vec<u64> = events.lock().unwrap().iter().map(|e| e.current).collect();
        assert_eq!(currents, vec![10, 20, 25]);
    }
}
