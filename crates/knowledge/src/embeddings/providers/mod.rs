//! Embedding provider implementations.

pub mod hashing;
pub mod huggingface;

pub use hashing::HashingProvider;
pub use huggingface::{normalize_embedding, HuggingFaceProvider};
