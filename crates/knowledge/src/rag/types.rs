//! RAG response and status types.

use crate::types::{GroupedResult, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answer for an empty query.
pub const EMPTY_QUERY_ANSWER: &str =
    "Please ask a question about trainer feedback, challenges or course plans.";

/// Answer when retrieval found nothing to build a context from.
pub const NO_RESULTS_ANSWER: &str = "I couldn't find any relevant trainer feedback or challenges related to your query. Please try rephrasing your question or asking about different topics.";

/// Answer when the pipeline itself failed.
pub const PIPELINE_ERROR_ANSWER: &str = "I apologize, but I encountered an error while processing your query. Please try again or contact support if the issue persists.";

/// A feedback record that contributed to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub feedback_id: String,
    pub project: String,
    pub course: String,
    pub centre: String,
    pub batch: String,
    pub date: String,
    pub trainer: String,
    pub logged_by: String,

    /// Content categories the record matched on, in retrieval order
    pub content_types: Vec<String>,

    /// Best similarity among the record's hits
    pub relevance_score: f32,
}

impl SourceRef {
    pub fn from_group(group: &GroupedResult) -> Self {
        let field = |key: &str| group.field(key).unwrap_or_default().to_string();

        Self {
            feedback_id: group.feedback_id.clone(),
            project: field("project_name"),
            course: field("course_name"),
            centre: field("centre_name"),
            batch: field("batch_id"),
            date: field("feedback_date"),
            trainer: field("user_name"),
            logged_by: field("logged_by_user_name"),
            content_types: group.content_type_names(),
            relevance_score: group.max_similarity,
        }
    }
}

/// How a query was handled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    /// Raw hits returned by the index
    pub total_found: usize,

    /// Hits that went into the context
    pub relevant_count: usize,

    pub filters_applied: Metadata,

    pub query_processed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Answer to a query, with the records it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub metadata: QueryMetadata,
}

impl RagResponse {
    /// A processed query that produced no generated answer.
    pub fn canned(answer: impl Into<String>, filters: Metadata, total_found: usize) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
            metadata: QueryMetadata {
                total_found,
                relevant_count: 0,
                filters_applied: filters,
                query_processed: true,
                error: None,
            },
        }
    }

    /// A query the pipeline failed on.
    pub fn failed(error: impl ToString) -> Self {
        Self {
            answer: PIPELINE_ERROR_ANSWER.to_string(),
            sources: Vec::new(),
            metadata: QueryMetadata {
                query_processed: false,
                error: Some(error.to_string()),
                ..QueryMetadata::default()
            },
        }
    }
}

/// Outcome of building the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitReport {
    pub total_feedback_entries: usize,
    pub skipped_records: usize,
    pub total_chunks: usize,
    pub skipped_fields: usize,
    pub embeddings_generated: usize,
    pub degraded_embeddings: usize,
    /// Entries in the index after the build
    pub index_count: usize,
    pub initialized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Ready,
    Error,
}

impl ServiceState {
    pub fn from_ok(ok: bool) -> Self {
        if ok {
            ServiceState::Ready
        } else {
            ServiceState::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Ready => "ready",
            ServiceState::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub total_chunks: usize,
    pub collection_name: String,
    pub backend: String,
    pub location: String,

    /// Embedding model the index was built with, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_with: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub record_store: ServiceState,
    pub embedding: ServiceState,
    pub generator: ServiceState,
    pub index: ServiceState,
}

/// Readiness of the pipeline and its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub initialized: bool,
    pub index: IndexStatus,
    pub services: ServiceStatus,

    /// Problems found while collecting the status
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<String>,
}
