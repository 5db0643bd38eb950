//! Index manifest.
//!
//! Written next to the index after every successful build. It records which
//! embedding model produced the vectors so a persisted index is never
//! queried with vectors from a different model.

use chrono::{DateTime, Utc};
use insight_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "manifest.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexManifest {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub backend: String,
    pub collection: String,
    pub total_records: usize,
    pub total_chunks: usize,
    pub skipped: usize,
    pub indexed_at: DateTime<Utc>,
}

impl IndexManifest {
    /// Manifest location for an index directory.
    pub fn path_in(index_dir: &Path) -> PathBuf {
        index_dir.join(MANIFEST_FILE)
    }

    /// Load the manifest, `None` when no index was ever built there.
    pub fn load(index_dir: &Path) -> AppResult<Option<Self>> {
        let path = Self::path_in(index_dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            AppError::Index(format!("Failed to read manifest at {:?}: {}", path, e))
        })?;
        let manifest = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Index(format!("Failed to parse manifest at {:?}: {}", path, e))
        })?;

        tracing::debug!("Loaded index manifest from {:?}", path);
        Ok(Some(manifest))
    }

    pub fn save(&self, index_dir: &Path) -> AppResult<()> {
        fs::create_dir_all(index_dir).map_err(|e| {
            AppError::Index(format!("Failed to create index directory: {}", e))
        })?;

        let path = Self::path_in(index_dir);
        let yaml = serde_yaml::to_string(self)?;
        fs::write(&path, yaml).map_err(|e| {
            AppError::Index(format!("Failed to write manifest to {:?}: {}", path, e))
        })?;

        tracing::debug!("Saved index manifest to {:?}", path);
        Ok(())
    }

    /// Delete the manifest if present.
    pub fn remove(index_dir: &Path) -> AppResult<()> {
        let path = Self::path_in(index_dir);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Why vectors from `provider`/`model` cannot be compared with this
    /// index, if they cannot.
    pub fn mismatch(&self, provider: &str, model: &str, dimensions: usize) -> Option<String> {
        if self.dimensions != dimensions {
            return Some(format!(
                "index holds {}-dimensional vectors, embedder produces {}",
                self.dimensions, dimensions
            ));
        }
        if self.provider != provider || self.model != model {
            return Some(format!(
                "index was built with {}/{}, embedder is {}/{}",
                self.provider, self.model, provider, model
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest() -> IndexManifest {
        IndexManifest {
            provider: "huggingface".into(),
            model: "BAAI/bge-small-en-v1.5".into(),
            dimensions: 384,
            backend: "lancedb".into(),
            collection: "trainer_feedback".into(),
            total_records: 12,
            total_chunks: 40,
            skipped: 1,
            indexed_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");

        assert!(IndexManifest::load(&dir).unwrap().is_none());

        let saved = manifest();
        saved.save(&dir).unwrap();
        let loaded = IndexManifest::load(&dir).unwrap().unwrap();
        assert_eq!(loaded, saved);

        IndexManifest::remove(&dir).unwrap();
        IndexManifest::remove(&dir).unwrap();
        assert!(IndexManifest::load(&dir).unwrap().is_none());
    }

    #[test]
    fn test_mismatch() {
        let m = manifest();
        assert_eq!(m.mismatch("huggingface", "BAAI/bge-small-en-v1.5", 384), None);
        assert!(m
            .mismatch("hashing", "hashing-v1", 384)
            .unwrap()
            .contains("built with"));
        assert!(m
            .mismatch("huggingface", "BAAI/bge-small-en-v1.5", 768)
            .unwrap()
            .contains("768"));
    }

    #[test]
    fn test_corrupt_manifest() {
        let temp = TempDir::new().unwrap();
        fs::write(IndexManifest::path_in(temp.path()), "provider: [").unwrap();
        assert!(IndexManifest::load(temp.path()).is_err());
    }
}
