//! Offline embedding provider based on hashed features.
//!
//! Every word and every character trigram of a word is hashed with SHA-256
//! into one signed dimension; the result is L2-normalized. Texts sharing
//! vocabulary end up close in cosine distance, which is enough for local
//! development and deterministic tests without a model endpoint.

use crate::embeddings::provider::EmbeddingProvider;
use insight_core::AppResult;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const MODEL_NAME: &str = "hashing-v1";

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "how",
];

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug)]
pub struct HashingProvider {
    dimensions: usize,
}

impl HashingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Deterministic embedding of `text`. Text without any usable word maps
    /// to the zero vector.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        let lower = text.to_lowercase();
        let mut frequencies: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 1 && !STOP_WORDS.contains(w))
        {
            *frequencies.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &frequencies {
            let weight = (*freq as f32).sqrt();
            self.add_feature(&mut embedding, word, WORD_WEIGHT * weight);

            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut embedding, &trigram, TRIGRAM_WEIGHT * weight);
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }

    fn add_feature(&self, embedding: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let slot = (u64::from_le_bytes(bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        embedding[slot] += sign * weight;
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingProvider {
    fn provider_name(&self) -> &str {
        "hashing"
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_once(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}
