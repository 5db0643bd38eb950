//! Retrieval pipeline type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Flat, string-only metadata attached to every indexed chunk.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key holding the chunk's content category.
pub const CONTENT_TYPE_KEY: &str = "content_type";

/// Metadata key holding the id of the record a chunk came from.
pub const FEEDBACK_ID_KEY: &str = "original_feedback_id";

/// Group key used when a hit carries no feedback id or category.
pub const UNKNOWN: &str = "unknown";

/// Which field of a feedback record a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    Feedback,
    Challenges,
    CoursePlan,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 3] = [
        ContentCategory::Feedback,
        ContentCategory::Challenges,
        ContentCategory::CoursePlan,
    ];

    /// Value stored under `content_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Feedback => "feedback",
            ContentCategory::Challenges => "challenges",
            ContentCategory::CoursePlan => "course_plan",
        }
    }

    /// Segment used inside chunk ids.
    pub fn id_segment(&self) -> &'static str {
        match self {
            ContentCategory::Feedback => "feedback",
            ContentCategory::Challenges => "challenges",
            ContentCategory::CoursePlan => "courseplan",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded piece of record text, ready to embed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique across a full reindex, stable across runs
    pub chunk_id: String,

    /// Non-empty, trimmed, at most `max_chunk_size` characters
    pub text: String,

    pub category: ContentCategory,

    /// Flattened context of the source record
    pub metadata: Metadata,

    pub source_record_id: String,
}

impl Chunk {
    /// Metadata as written to the index: the record context plus the
    /// chunk's category and source id.
    pub fn index_metadata(&self) -> Metadata {
        let mut metadata = self.metadata.clone();
        metadata.insert(CONTENT_TYPE_KEY.to_string(), self.category.as_str().to_string());
        metadata.insert(FEEDBACK_ID_KEY.to_string(), self.source_record_id.clone());
        metadata
    }
}

/// One nearest-neighbour result from the similarity index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine distance, lower is closer
    pub distance: f32,
    /// `1 - distance`, not clamped
    pub similarity_score: f32,
}

impl RetrievalHit {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: Metadata, distance: f32) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
            distance,
            similarity_score: 1.0 - distance,
        }
    }

    /// Metadata value, treating empty strings as absent.
    pub fn field(&self, key: &str) -> Option<&str> {
        non_empty(&self.metadata, key)
    }
}

/// A text fragment and the score it was retrieved with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredText {
    pub text: String,
    pub similarity_score: f32,
}

/// Texts of one content category inside a group, in retrieval order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBucket {
    pub content_type: String,
    pub items: Vec<ScoredText>,
}

/// All hits that came from one feedback record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedResult {
    pub feedback_id: String,

    /// Metadata of the first hit seen for this record
    pub metadata: Metadata,

    /// Buckets in first-encounter order
    pub content_types: Vec<ContentBucket>,

    pub max_similarity: f32,

    pub total_chunks: usize,
}

impl GroupedResult {
    pub fn field(&self, key: &str) -> Option<&str> {
        non_empty(&self.metadata, key)
    }

    pub fn content_type_names(&self) -> Vec<String> {
        self.content_types
            .iter()
            .map(|bucket| bucket.content_type.clone())
            .collect()
    }

    pub fn bucket(&self, content_type: &str) -> Option<&ContentBucket> {
        self.content_types
            .iter()
            .find(|bucket| bucket.content_type == content_type)
    }
}

fn non_empty<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Why one unit of work (a record or one of its fields) was skipped while
/// its siblings carried on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("record {record_id}: entry is not an object")]
    MalformedRecord { record_id: String },

    #[error("record {record_id}: field '{field}' holds {found}, expected text")]
    MalformedField {
        record_id: String,
        field: String,
        found: &'static str,
    },

    #[error("record {record_id}: lookup of {entity} '{key}' failed: {message}")]
    LookupFailed {
        record_id: String,
        entity: &'static str,
        key: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names() {
        assert_eq!(ContentCategory::CoursePlan.as_str(), "course_plan");
        assert_eq!(ContentCategory::CoursePlan.id_segment(), "courseplan");
        assert_eq!(ContentCategory::parse("challenges"), Some(ContentCategory::Challenges));
        assert_eq!(ContentCategory::parse("courseplan"), None);
    }

    #[test]
    fn test_hit_similarity_is_not_clamped() {
        let hit = RetrievalHit::new("a", "text", Metadata::new(), 1.4);
        assert!((hit.similarity_score - (-0.4)).abs() < 1e-6);
    }

    #[test]
    fn test_index_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("project_name".into(), "Seaweed Cultivation".into());
        let chunk = Chunk {
            chunk_id: "7_feedback_0".into(),
            text: "Good turnout".into(),
            category: ContentCategory::Feedback,
            metadata,
            source_record_id: "7".into(),
        };

        let stored = chunk.index_metadata();
        assert_eq!(stored.get(CONTENT_TYPE_KEY).map(String::as_str), Some("feedback"));
        assert_eq!(stored.get(FEEDBACK_ID_KEY).map(String::as_str), Some("7"));
        assert_eq!(stored.get("project_name").map(String::as_str), Some("Seaweed Cultivation"));
    }

    #[test]
    fn test_field_ignores_blank_values() {
        let mut metadata = Metadata::new();
        metadata.insert("batch_id".into(), "  ".into());
        let hit = RetrievalHit::new("a", "t", metadata, 0.1);
        assert_eq!(hit.field("batch_id"), None);
        assert_eq!(hit.field("missing"), None);
    }
}
