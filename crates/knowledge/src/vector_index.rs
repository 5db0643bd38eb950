//! Similarity index abstraction.
//!
//! An index stores `(id, vector, document, metadata)` entries and answers
//! nearest-neighbour queries by cosine distance, optionally restricted by a
//! conjunctive metadata filter.

use crate::types::{Metadata, RetrievalHit};
use insight_core::config::IndexSettings;
use insight_core::{AppError, AppResult};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Conjunction of metadata equality conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhereClause {
    conditions: BTreeMap<String, String>,
}

impl WhereClause {
    /// Build a clause from extracted filters. Empty values are skipped;
    /// `None` when nothing is left to filter on.
    pub fn from_filters(filters: &Metadata) -> Option<Self> {
        let conditions: BTreeMap<String, String> = filters
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if conditions.is_empty() {
            None
        } else {
            Some(Self { conditions })
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }

    /// Whether every condition holds for `metadata`.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }

    /// SQL predicate, e.g. `project_name = 'Seaweed Cultivation' AND ...`.
    pub fn to_sql(&self) -> String {
        self.conditions
            .iter()
            .map(|(key, value)| format!("{} = '{}'", key, value.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Backend-agnostic similarity index.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// "lancedb", "memory", ...
    fn backend(&self) -> &str;

    /// Where the data lives, for status output.
    fn location(&self) -> String;

    /// Add entries. All four slices must have the same length, every vector
    /// the index dimension and every id must be new; otherwise nothing is
    /// written.
    async fn add(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        documents: &[String],
        metadatas: &[Metadata],
    ) -> AppResult<()>;

    /// Up to `k` nearest entries, ascending by cosine distance.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&WhereClause>,
    ) -> AppResult<Vec<RetrievalHit>>;

    async fn count(&self) -> AppResult<usize>;

    /// Remove every entry. Idempotent.
    async fn clear(&self) -> AppResult<()>;
}

/// Structural checks shared by the index backends, run before any write.
pub fn validate_batch(
    ids: &[String],
    vectors: &[Vec<f32>],
    documents: &[String],
    metadatas: &[Metadata],
    dimensions: usize,
) -> AppResult<()> {
    let n = ids.len();
    if vectors.len() != n || documents.len() != n || metadatas.len() != n {
        return Err(AppError::Index(format!(
            "Length mismatch: {} ids, {} vectors, {} documents, {} metadatas",
            n,
            vectors.len(),
            documents.len(),
            metadatas.len()
        )));
    }

    if let Some((pos, vector)) = vectors
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != dimensions)
    {
        return Err(AppError::Index(format!(
            "Vector {} ('{}') has {} dimensions, index expects {}",
            pos,
            ids[pos],
            vector.len(),
            dimensions
        )));
    }

    let mut seen = HashSet::with_capacity(n);
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(AppError::Index(format!("Duplicate id in batch: '{}'", id)));
        }
    }

    Ok(())
}

/// Cosine distance `1 - cos(a, b)`. Zero-norm or mismatched vectors are at
/// distance 1.0 from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 1.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a * norm_b)
}

/// Open the configured index backend at `path`.
pub async fn open_index(
    settings: &IndexSettings,
    path: PathBuf,
    dimensions: usize,
) -> AppResult<Arc<dyn VectorIndex>> {
    match settings.backend.as_str() {
        "lancedb" => {
            let index =
                crate::lancedb_index::LanceDbIndex::open(&path, &settings.collection, dimensions)
                    .await?;
            Ok(Arc::new(index))
        }
        "memory" => {
            let snapshot = path.join(format!("{}.json", settings.collection));
            let index = crate::memory_index::MemoryIndex::open(snapshot, dimensions).await?;
            Ok(Arc::new(index))
        }
        other => Err(AppError::Config(format!(
            "Unknown index backend: '{}'. Supported backends: lancedb, memory",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_where_clause_skips_empty_values() {
        let clause = WhereClause::from_filters(&filters(&[
            ("project_name", "Seaweed Cultivation"),
            ("batch_id", " "),
        ]))
        .unwrap();

        assert_eq!(clause.keys().collect::<Vec<_>>(), vec!["project_name"]);
        assert!(WhereClause::from_filters(&filters(&[("batch_id", "")])).is_none());
        assert!(WhereClause::from_filters(&Metadata::new()).is_none());
    }

    #[test]
    fn test_where_clause_matches_all_conditions() {
        let clause = WhereClause::from_filters(&filters(&[
            ("content_type", "challenges"),
            ("project_name", "Seaweed Cultivation"),
        ]))
        .unwrap();

        assert!(clause.matches(&filters(&[
            ("content_type", "challenges"),
            ("project_name", "Seaweed Cultivation"),
            ("batch_id", "B-12"),
        ])));
        assert!(!clause.matches(&filters(&[("content_type", "challenges")])));
    }

    #[test]
    fn test_where_clause_sql_escapes_quotes() {
        let clause = WhereClause::from_filters(&filters(&[
            ("centre_name", "St. Mary's"),
            ("content_type", "feedback"),
        ]))
        .unwrap();

        assert_eq!(
            clause.to_sql(),
            "centre_name = 'St. Mary''s' AND content_type = 'feedback'"
        );
    }

    #[test]
    fn test_validate_batch_length_mismatch() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let docs = ids.clone();
        let metas = vec![Metadata::new(); 3];
        let vectors = vec![vec![1.0, 0.0]; 2];

        let err = validate_batch(&ids, &vectors, &docs, &metas, 2).unwrap_err();
        assert!(err.to_string().contains("Length mismatch"));
    }

    #[test]
    fn test_validate_batch_dimension_and_duplicates() {
        let metas = vec![Metadata::new(); 2];
        let docs = vec!["x".to_string(), "y".to_string()];

        let ids = vec!["a".to_string(), "b".to_string()];
        let vectors = vec![vec![1.0, 0.0], vec![1.0]];
        assert!(validate_batch(&ids, &vectors, &docs, &metas, 2).is_err());

        let ids = vec!["a".to_string(), "a".to_string()];
        let vectors = vec![vec![1.0, 0.0]; 2];
        let err = validate_batch(&ids, &vectors, &docs, &metas, 2).unwrap_err();
        assert!(err.to_string().contains("Duplicate id"));
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
    }
}
