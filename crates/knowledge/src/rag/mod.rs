//! Retrieval-augmented answering over the feedback index.
//!
//! Query analysis, result aggregation and answer composition are pure and
//! usable on their own; [`FeedbackRag`] ties them to the record store, the
//! embedding gateway, the index and the generator.

pub mod aggregate;
pub mod analyzer;
pub mod compose;
pub mod service;
pub mod types;

pub use analyzer::{FilterCategory, QueryAnalyzer, RuleOutcome};
pub use compose::AnswerComposer;
pub use service::{FeedbackRag, RagOptions};
pub use types::{
    IndexStatus, InitReport, QueryMetadata, RagResponse, ServiceState, ServiceStatus, SourceRef,
    SystemStatus,
};
