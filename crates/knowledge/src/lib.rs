//! Trainer feedback knowledge base.
//!
//! Turns trainer feedback records into an embedded similarity index and
//! answers natural-language questions over it:
//!
//! - [`records`]: record store access and client-side joins
//! - [`chunker`]: bounded, overlapping text chunks with flattened metadata
//! - [`embeddings`]: retrying embedding gateway with a typed fallback
//! - [`vector_index`]: index contract, with LanceDB and in-memory backends
//! - [`rag`]: query analysis, aggregation, prompt composition, orchestration

pub mod chunker;
pub mod embeddings;
pub mod lancedb_index;
pub mod manifest;
pub mod memory_index;
pub mod progress;
pub mod rag;
pub mod records;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::Chunker;
pub use embeddings::{Embedding, EmbeddingGateway, EmbeddingProvider};
pub use manifest::IndexManifest;
pub use progress::{ProgressCallback, ProgressEvent, ProgressReporter};
pub use rag::{FeedbackRag, QueryAnalyzer, RagOptions, RagResponse, SystemStatus};
pub use records::{FeedbackRecord, JsonRecordStore, RecordStore};
pub use types::{Chunk, ContentCategory, GroupedResult, Metadata, RetrievalHit, SkipReason};
pub use vector_index::{open_index, VectorIndex, WhereClause};
