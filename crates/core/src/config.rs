//! Configuration management for Trainer Insight.
//!
//! Configuration is layered, later layers winning:
//! - Built-in defaults
//! - Config file (`.insight/config.yaml`, or `INSIGHT_CONFIG`)
//! - Environment variables
//! - Command-line flags (`with_overrides`)
//!
//! All state lives in the workspace's `.insight/` directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::retry::RetryPolicy;

pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["huggingface", "hashing"];
pub const KNOWN_GENERATOR_PROVIDERS: [&str; 3] = ["chat-completions", "huggingface", "openai"];
pub const KNOWN_INDEX_BACKENDS: [&str; 2] = ["lancedb", "memory"];

const DEFAULT_TOKEN_ENV: &str = "HUGGINGFACE_API_TOKEN";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace root (contains `.insight/`)
    pub workspace: PathBuf,

    /// Explicit config file path
    pub config_file: Option<PathBuf>,

    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    pub no_color: bool,

    pub embedding: EmbeddingSettings,
    pub generator: GeneratorSettings,
    pub index: IndexSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub records: RecordsSettings,
}

/// Embedding backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// `huggingface` or `hashing`
    pub provider: String,
    pub model: String,
    /// Defaults to the hosted inference URL of `model`
    pub endpoint: Option<String>,
    pub api_key_env: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
    /// Pause between consecutive calls of a batch
    pub inter_call_delay_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "huggingface".to_string(),
            model: "BAAI/bge-small-en-v1.5".to_string(),
            endpoint: None,
            api_key_env: DEFAULT_TOKEN_ENV.to_string(),
            dimensions: 384,
            timeout_secs: 30,
            retry: RetryPolicy::new(3, 1_000, 10_000),
            inter_call_delay_ms: 100,
        }
    }
}

impl EmbeddingSettings {
    pub fn endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://api-inference.huggingface.co/models/{}",
                self.model
            )
        })
    }

    pub fn api_key(&self) -> Option<String> {
        read_secret(&self.api_key_env)
    }
}

/// Generator (chat completion) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorSettings {
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            provider: "chat-completions".to_string(),
            model: "meta-llama/Llama-3.1-8B-Instruct".to_string(),
            endpoint: "https://router.huggingface.co/v1/chat/completions".to_string(),
            api_key_env: DEFAULT_TOKEN_ENV.to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            top_p: 0.9,
            timeout_secs: 60,
            retry: RetryPolicy::new(3, 1_000, 8_000),
        }
    }
}

impl GeneratorSettings {
    pub fn api_key(&self) -> Option<String> {
        read_secret(&self.api_key_env)
    }
}

/// Similarity index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexSettings {
    /// `lancedb` or `memory`
    pub backend: String,
    /// Relative paths resolve against the workspace
    pub path: PathBuf,
    pub collection: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: "lancedb".to_string(),
            path: PathBuf::from(".insight/index"),
            collection: "trainer_feedback".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingSettings {
    pub max_chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub similarity_threshold: f32,
    /// Build the index on the first query when it is empty
    pub auto_initialize: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.7,
            auto_initialize: true,
        }
    }
}

/// Location of the record store export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordsSettings {
    pub path: PathBuf,
}

impl Default for RecordsSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".insight/records.json"),
        }
    }
}

/// On-disk shape of `config.yaml`. Every section is optional; missing keys
/// inside a section take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    logging: Option<LoggingConfig>,
    embedding: Option<EmbeddingSettings>,
    generator: Option<GeneratorSettings>,
    index: Option<IndexSettings>,
    chunking: Option<ChunkingSettings>,
    retrieval: Option<RetrievalSettings>,
    records: Option<RecordsSettings>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
            embedding: EmbeddingSettings::default(),
            generator: GeneratorSettings::default(),
            index: IndexSettings::default(),
            chunking: ChunkingSettings::default(),
            retrieval: RetrievalSettings::default(),
            records: RecordsSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `INSIGHT_WORKSPACE`: workspace path
    /// - `INSIGHT_CONFIG`: config file path
    /// - `INSIGHT_EMBEDDING_PROVIDER`, `INSIGHT_EMBEDDING_MODEL`
    /// - `INSIGHT_GENERATOR_MODEL`
    /// - `INSIGHT_INDEX_BACKEND`
    /// - `INSIGHT_RECORDS`: record export path
    /// - `RUST_LOG`, `NO_COLOR`
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with the workspace and config file given by
    /// the caller taking precedence over the environment.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| env_path("INSIGHT_WORKSPACE")) {
            config.workspace = workspace;
        }
        config.config_file = config_file.or_else(|| env_path("INSIGHT_CONFIG"));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.insight_dir().join("config.yaml"));

        if config_path.exists() {
            config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(provider) = std::env::var("INSIGHT_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Ok(model) = std::env::var("INSIGHT_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(model) = std::env::var("INSIGHT_GENERATOR_MODEL") {
            self.generator.model = model;
        }
        if let Ok(backend) = std::env::var("INSIGHT_INDEX_BACKEND") {
            self.index.backend = backend;
        }
        if let Some(records) = env_path("INSIGHT_RECORDS") {
            self.records.path = records;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }
    }

    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| {
                AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(json) = logging.json {
                self.log_json = json;
            }
        }

        if let Some(embedding) = file.embedding {
            self.embedding = embedding;
        }
        if let Some(generator) = file.generator {
            self.generator = generator;
        }
        if let Some(index) = file.index {
            self.index = index;
        }
        if let Some(chunking) = file.chunking {
            self.chunking = chunking;
        }
        if let Some(retrieval) = file.retrieval {
            self.retrieval = retrieval;
        }
        if let Some(records) = file.records {
            self.records = records;
        }

        Ok(())
    }

    /// Apply CLI overrides. Flags win over the environment and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        embedding_provider: Option<String>,
        generator_model: Option<String>,
        index_backend: Option<String>,
        records: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = embedding_provider {
            self.embedding.provider = provider;
        }

        if let Some(model) = generator_model {
            self.generator.model = model;
        }

        if let Some(backend) = index_backend {
            self.index.backend = backend;
        }

        if let Some(records) = records {
            self.records.path = records;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Path to the `.insight` directory.
    pub fn insight_dir(&self) -> PathBuf {
        self.workspace.join(".insight")
    }

    /// Ensure the `.insight` directory exists.
    pub fn ensure_insight_dir(&self) -> AppResult<()> {
        let dir = self.insight_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .insight directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve a possibly relative path against the workspace.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.resolve(&self.index.path)
    }

    pub fn records_path(&self) -> PathBuf {
        self.resolve(&self.records.path)
    }

    /// Directory holding prompt overrides.
    pub fn prompts_dir(&self) -> PathBuf {
        self.insight_dir().join("prompts")
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        check_known("embedding provider", &self.embedding.provider, &KNOWN_EMBEDDING_PROVIDERS)?;
        check_known("generator provider", &self.generator.provider, &KNOWN_GENERATOR_PROVIDERS)?;
        check_known("index backend", &self.index.backend, &KNOWN_INDEX_BACKENDS)?;

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }

        if self.chunking.max_chunk_size == 0 {
            return Err(AppError::Config(
                "chunking.maxChunkSize must be greater than zero".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config(
                "retrieval.topK must be greater than zero".to_string(),
            ));
        }

        if self.index.collection.trim().is_empty() {
            return Err(AppError::Config(
                "index.collection must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_known(what: &str, value: &str, known: &[&str]) -> AppResult<()> {
    if known.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Unknown {}: {}. Supported: {}",
            what,
            value,
            known.join(", ")
        )))
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

fn read_secret(env_name: &str) -> Option<String> {
    std::env::var(env_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.chunking.max_chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.retrieval.similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.generator.max_tokens, 1000);
        assert_eq!(config.index.collection, "trainer_feedback");
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_embedding_endpoint_follows_model() {
        let mut settings = EmbeddingSettings::default();
        assert_eq!(
            settings.endpoint(),
            "https://api-inference.huggingface.co/models/BAAI/bge-small-en-v1.5"
        );
        settings.endpoint = Some("http://localhost:8080/embed".to_string());
        assert_eq!(settings.endpoint(), "http://localhost:8080/embed");
    }

    #[test]
    fn test_insight_dir() {
        let config = AppConfig::default();
        assert!(config.insight_dir().ends_with(".insight"));
        assert!(config.prompts_dir().ends_with(".insight/prompts"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(
            Some("hashing".to_string()),
            Some("my-model".to_string()),
            Some("memory".to_string()),
            Some(PathBuf::from("/tmp/export.json")),
            None,
            true,
            false,
        );

        assert_eq!(config.embedding.provider, "hashing");
        assert_eq!(config.generator.model, "my-model");
        assert_eq!(config.index.backend, "memory");
        assert_eq!(config.records_path(), PathBuf::from("/tmp/export.json"));
        assert!(config.verbose);
        assert_eq!(config.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_relative_paths_resolve_against_workspace() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/srv/insight");
        assert_eq!(config.index_path(), PathBuf::from("/srv/insight/.insight/index"));
        assert_eq!(
            config.records_path(),
            PathBuf::from("/srv/insight/.insight/records.json")
        );
    }

    #[test]
    fn test_load_merges_yaml_sections() {
        let dir = TempDir::new().unwrap();
        let yaml_path = dir.path().join("insight.yaml");
        std::fs::write(
            &yaml_path,
            r#"
logging:
  level: warn
  color: false
chunking:
  maxChunkSize: 200
retrieval:
  topK: 8
  similarityThreshold: 0.5
index:
  backend: memory
"#,
        )
        .unwrap();

        let config =
            AppConfig::load_from(Some(dir.path().to_path_buf()), Some(yaml_path)).unwrap();

        assert_eq!(config.chunking.max_chunk_size, 200);
        // Unset keys keep their defaults.
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k, 8);
        assert!(config.retrieval.auto_initialize);
        assert_eq!(config.index.backend, "memory");
        assert_eq!(config.index.collection, "trainer_feedback");
        assert!(config.no_color);
    }

    #[test]
    fn test_load_partial_retry_block() {
        let dir = TempDir::new().unwrap();
        let yaml_path = dir.path().join("insight.yaml");
        std::fs::write(&yaml_path, "embedding:\n  retry:\n    maxAttempts: 5\n").unwrap();

        let config =
            AppConfig::load_from(Some(dir.path().to_path_buf()), Some(yaml_path)).unwrap();

        assert_eq!(config.embedding.retry.max_attempts, 5);
        assert_eq!(config.embedding.retry.initial_backoff_ms, 1_000);
        assert_eq!(config.embedding.retry.max_backoff_ms, 10_000);
        assert_eq!(config.embedding.dimensions, 384);
    }

    #[test]
    fn test_load_missing_explicit_config_file() {
        let dir = TempDir::new().unwrap();
        let result = AppConfig::load_from(
            Some(dir.path().to_path_buf()),
            Some(dir.path().join("absent.yaml")),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_backend() {
        let mut config = AppConfig::default();
        config.index.backend = "chroma".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = AppConfig::default();
        config.chunking.max_chunk_size = 0;
        assert!(config.validate().is_err());
    }
}
