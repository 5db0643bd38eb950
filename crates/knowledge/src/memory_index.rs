//! In-memory similarity index with an optional JSON snapshot.
//!
//! Exact cosine search over every entry. Small enough collections (a few
//! thousand chunks) are searched in well under a millisecond, and the
//! snapshot makes the index survive restarts without a database.

use crate::types::{Metadata, RetrievalHit};
use crate::vector_index::{cosine_distance, validate_batch, VectorIndex, WhereClause};
use insight_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    id: String,
    document: String,
    embedding: Vec<f32>,
    metadata: Metadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    dimensions: usize,
    entries: Vec<Entry>,
}

#[derive(Debug)]
pub struct MemoryIndex {
    dimensions: usize,
    snapshot: Option<PathBuf>,
    entries: RwLock<Vec<Entry>>,
}

impl MemoryIndex {
    /// A volatile index.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            snapshot: None,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// An index persisted to `snapshot`, loading existing entries.
    pub async fn open(snapshot: PathBuf, dimensions: usize) -> AppResult<Self> {
        let entries = if snapshot.exists() {
            let loaded = load_snapshot(&snapshot).await?;
            if loaded.dimensions != dimensions && !loaded.entries.is_empty() {
                return Err(AppError::Index(format!(
                    "Index snapshot {:?} holds {}-dimensional vectors, configured {}. Run `insight clear` and reindex.",
                    snapshot, loaded.dimensions, dimensions
                )));
            }
            info!(
                entries = loaded.entries.len(),
                "Loaded index snapshot from {:?}", snapshot
            );
            loaded.entries
        } else {
            Vec::new()
        };

        Ok(Self {
            dimensions,
            snapshot: Some(snapshot),
            entries: RwLock::new(entries),
        })
    }

    async fn persist(&self, entries: &[Entry]) -> AppResult<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let snapshot = Snapshot {
            dimensions: self.dimensions,
            entries: entries.to_vec(),
        };
        let json = serde_json::to_vec(&snapshot)?;
        tokio::fs::write(path, json).await.map_err(|e| {
            AppError::Index(format!("Failed to write index snapshot {:?}: {}", path, e))
        })?;

        debug!(entries = entries.len(), "Wrote index snapshot {:?}", path);
        Ok(())
    }
}

async fn load_snapshot(path: &Path) -> AppResult<Snapshot> {
    let contents = tokio::fs::read(path).await.map_err(|e| {
        AppError::Index(format!("Failed to read index snapshot {:?}: {}", path, e))
    })?;
    serde_json::from_slice(&contents).map_err(|e| {
        AppError::Index(format!("Failed to parse index snapshot {:?}: {}", path, e))
    })
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    fn backend(&self) -> &str {
        "memory"
    }

    fn location(&self) -> String {
        match &self.snapshot {
            Some(path) => path.display().to_string(),
            None => "(in memory)".to_string(),
        }
    }

    async fn add(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        documents: &[String],
        metadatas: &[Metadata],
    ) -> AppResult<()> {
        validate_batch(ids, vectors, documents, metadatas, self.dimensions)?;

        let mut entries = self.entries.write().await;
        let existing: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        if let Some(id) = ids.iter().find(|id| existing.contains(id.as_str())) {
            return Err(AppError::Index(format!("Id already indexed: '{}'", id)));
        }

        let before = entries.len();
        entries.extend((0..ids.len()).map(|i| Entry {
            id: ids[i].clone(),
            document: documents[i].clone(),
            embedding: vectors[i].clone(),
            metadata: metadatas[i].clone(),
        }));

        if let Err(e) = self.persist(&entries).await {
            entries.truncate(before);
            return Err(e);
        }

        debug!(added = ids.len(), total = entries.len(), "Added entries to memory index");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&WhereClause>,
    ) -> AppResult<Vec<RetrievalHit>> {
        if vector.len() != self.dimensions {
            return Err(AppError::Index(format!(
                "Query vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<(f32, &Entry)> = entries
            .iter()
            .filter(|entry| filter.map_or(true, |f| f.matches(&entry.metadata)))
            .map(|entry| (cosine_distance(vector, &entry.embedding), entry))
            .collect();

        // Stable: equal distances keep insertion order.
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, entry)| {
                RetrievalHit::new(
                    entry.id.clone(),
                    entry.document.clone(),
                    entry.metadata.clone(),
                    distance,
                )
            })
            .collect())
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.persist(&entries).await?;
        info!("Cleared memory index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    async fn seeded() -> MemoryIndex {
        let index = MemoryIndex::new(2);
        index
            .add(
                &strings(&["a", "b", "c"]),
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.1]],
                &strings(&["rafts", "attendance", "rafts again"]),
                &[
                    meta(&[("content_type", "feedback")]),
                    meta(&[("content_type", "challenges")]),
                    meta(&[("content_type", "challenges")]),
                ],
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let index = seeded().await;
        let hits = index.query(&[1.0, 0.0], 3, None).await.unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(hits[0].distance.abs() < 1e-6);
        assert!((hits[0].similarity_score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_with_filter_and_limit() {
        let index = seeded().await;
        let filter = WhereClause::from_filters(&meta(&[("content_type", "challenges")])).unwrap();

        let hits = index.query(&[1.0, 0.0], 1, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "c");
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let index = MemoryIndex::new(2);
        index
            .add(
                &strings(&["first", "second"]),
                &[vec![0.0, 1.0], vec![0.0, 2.0]],
                &strings(&["x", "y"]),
                &[Metadata::new(), Metadata::new()],
            )
            .await
            .unwrap();

        let hits = index.query(&[0.0, 1.0], 2, None).await.unwrap();
        assert_eq!(hits[0].id, "first");
        assert_eq!(hits[1].id, "second");
    }

    #[tokio::test]
    async fn test_mismatched_add_leaves_index_unchanged() {
        let index = seeded().await;
        let result = index
            .add(
                &strings(&["d", "e", "f"]),
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
                &strings(&["1", "2", "3"]),
                &[Metadata::new(), Metadata::new(), Metadata::new()],
            )
            .await;

        assert!(result.is_err());
        assert_eq!(index.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_existing_id_is_rejected() {
        let index = seeded().await;
        let result = index
            .add(
                &strings(&["z", "a"]),
                &[vec![1.0, 0.0], vec![1.0, 0.0]],
                &strings(&["1", "2"]),
                &[Metadata::new(), Metadata::new()],
            )
            .await;

        assert!(matches!(result, Err(AppError::Index(_))));
        assert_eq!(index.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let index = seeded().await;
        index.clear().await.unwrap();
        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query(&[1.0, 0.0], 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index").join("trainer_feedback.json");

        {
            let index = MemoryIndex::open(path.clone(), 2).await.unwrap();
            index
                .add(
                    &strings(&["42_feedback_0"]),
                    &[vec![0.6, 0.8]],
                    &strings(&["Rafts planted on time"]),
                    &[meta(&[("original_feedback_id", "42")])],
                )
                .await
                .unwrap();
        }

        let reopened = MemoryIndex::open(path.clone(), 2).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let hits = reopened.query(&[0.6, 0.8], 1, None).await.unwrap();
        assert_eq!(hits[0].text, "Rafts planted on time");
        assert_eq!(hits[0].field("original_feedback_id"), Some("42"));

        assert!(MemoryIndex::open(path, 3).await.is_err());
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let index = seeded().await;
        assert!(index.query(&[1.0, 0.0, 0.0], 3, None).await.is_err());
    }
}
