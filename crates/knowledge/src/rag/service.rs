//! The feedback RAG service: builds the index and answers queries.

use crate::chunker::Chunker;
use crate::embeddings::EmbeddingGateway;
use crate::manifest::IndexManifest;
use crate::progress::ProgressReporter;
use crate::rag::aggregate;
use crate::rag::analyzer::QueryAnalyzer;
use crate::rag::compose::{parse_reply, AnswerComposer};
use crate::rag::types::{
    IndexStatus, InitReport, QueryMetadata, RagResponse, ServiceState, ServiceStatus, SourceRef,
    SystemStatus, EMPTY_QUERY_ANSWER, NO_RESULTS_ANSWER,
};
use crate::records::{assemble, EntityKind, JsonRecordStore, RecordStore};
use crate::types::{Metadata, RetrievalHit};
use crate::vector_index::{open_index, VectorIndex, WhereClause};
use chrono::Utc;
use insight_core::config::{ChunkingSettings, GeneratorSettings, RetrievalSettings};
use insight_core::{AppConfig, AppError, AppResult};
use insight_llm::{complete_with_retry, create_client, LlmClient, LlmRequest, LlmResponse};
use insight_prompt::BuiltPrompt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Pipeline settings that are not owned by a collaborator.
#[derive(Debug, Clone)]
pub struct RagOptions {
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub generator: GeneratorSettings,
    pub collection: String,
    /// Where the index manifest lives. `None` skips manifest bookkeeping.
    pub manifest_dir: Option<PathBuf>,
    /// Directory searched for prompt overrides
    pub prompts_dir: Option<PathBuf>,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingSettings::default(),
            retrieval: RetrievalSettings::default(),
            generator: GeneratorSettings::default(),
            collection: insight_core::config::IndexSettings::default().collection,
            manifest_dir: None,
            prompts_dir: None,
        }
    }
}

impl RagOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chunking: config.chunking,
            retrieval: config.retrieval.clone(),
            generator: config.generator.clone(),
            collection: config.index.collection.clone(),
            manifest_dir: Some(config.index_path()),
            prompts_dir: Some(config.prompts_dir()),
        }
    }
}

/// Retrieval-augmented answering over trainer feedback.
///
/// Every collaborator is injected. Initialization is not atomic with
/// respect to concurrent queries; callers that rebuild while serving must
/// serialize on [`FeedbackRag::is_ready`].
pub struct FeedbackRag {
    store: Arc<dyn RecordStore>,
    gateway: EmbeddingGateway,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LlmClient>,
    analyzer: QueryAnalyzer,
    composer: AnswerComposer,
    chunker: Chunker,
    options: RagOptions,
    ready: AtomicBool,
}

impl FeedbackRag {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: EmbeddingGateway,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
        options: RagOptions,
    ) -> AppResult<Self> {
        let analyzer = QueryAnalyzer::new()?;
        let composer = AnswerComposer::new(options.prompts_dir.as_deref())?;
        let chunker = Chunker::new(options.chunking);

        Ok(Self {
            store,
            gateway,
            index,
            llm,
            analyzer,
            composer,
            chunker,
            options,
            ready: AtomicBool::new(false),
        })
    }

    /// Wire the configured adapters: the JSON record export, the embedding
    /// provider, the index backend and the generator.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let records_path = config.records_path();
        let store = if records_path.exists() {
            JsonRecordStore::open(&records_path)?
        } else {
            warn!("Record export not found at {:?}", records_path);
            JsonRecordStore::empty(records_path.display().to_string())
        };

        let gateway = EmbeddingGateway::from_settings(&config.embedding)?;
        let index = open_index(&config.index, config.index_path(), gateway.dimensions()).await?;

        let generator = &config.generator;
        let api_key = generator.api_key();
        let llm = create_client(
            &generator.provider,
            &generator.endpoint,
            api_key.as_deref(),
            Duration::from_secs(generator.timeout_secs),
        )
        .map_err(|e| AppError::Llm(format!("Failed to create generator client: {}", e)))?;

        Self::new(
            Arc::new(store),
            gateway,
            index,
            llm,
            RagOptions::from_config(config),
        )
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn analyzer(&self) -> &QueryAnalyzer {
        &self.analyzer
    }

    /// Rebuild the index from the record store.
    ///
    /// Marks the service ready on success and not ready on failure.
    pub async fn initialize(&self, progress: &ProgressReporter) -> AppResult<InitReport> {
        info!("Initializing feedback index");

        match self.build_index(progress).await {
            Ok(report) => {
                self.ready.store(true, Ordering::SeqCst);
                info!(
                    records = report.total_feedback_entries,
                    chunks = report.total_chunks,
                    degraded = report.degraded_embeddings,
                    "Feedback index initialized"
                );
                Ok(report)
            }
            Err(e) => {
                self.ready.store(false, Ordering::SeqCst);
                error!("Initialization failed: {}", e);
                Err(e)
            }
        }
    }

    async fn build_index(&self, progress: &ProgressReporter) -> AppResult<InitReport> {
        let assembly = assemble(self.store.as_ref()).await?;
        progress.assemble(
            assembly.records.len() as u64,
            assembly.skipped.len() as u64,
            self.store.name(),
        );
        if assembly.records.is_empty() {
            return Err(AppError::Records(format!(
                "No feedback records found in {}",
                self.store.name()
            )));
        }

        let chunked = self.chunker.chunk_all(&assembly.records);
        progress.chunk(assembly.records.len() as u64, chunked.chunks.len() as u64);
        if chunked.chunks.is_empty() {
            return Err(AppError::Knowledge(
                "No text chunks were created from the feedback records".to_string(),
            ));
        }

        let texts: Vec<String> = chunked.chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.gateway.embed_batch(&texts, progress).await;
        if embeddings.len() != chunked.chunks.len() {
            return Err(AppError::Invariant(format!(
                "{} chunks but {} embeddings",
                chunked.chunks.len(),
                embeddings.len()
            )));
        }
        let degraded = embeddings.iter().filter(|e| e.is_degraded()).count();

        let ids: Vec<String> = chunked.chunks.iter().map(|c| c.chunk_id.clone()).collect();
        let metadatas: Vec<Metadata> = chunked.chunks.iter().map(|c| c.index_metadata()).collect();
        let vectors: Vec<Vec<f32>> = embeddings.into_iter().map(|e| e.into_vector()).collect();

        let total = ids.len() as u64;
        progress.index(0, total, self.index.backend());
        self.index.clear().await?;
        self.index.add(&ids, &vectors, &texts, &metadatas).await?;
        progress.index(total, total, self.index.backend());

        let index_count = self.index.count().await?;
        let initialized_at = Utc::now();

        if let Some(dir) = &self.options.manifest_dir {
            IndexManifest {
                provider: self.gateway.provider_name().to_string(),
                model: self.gateway.model_name().to_string(),
                dimensions: self.gateway.dimensions(),
                backend: self.index.backend().to_string(),
                collection: self.options.collection.clone(),
                total_records: assembly.records.len(),
                total_chunks: ids.len(),
                skipped: assembly.skipped.len() + chunked.skipped.len(),
                indexed_at: initialized_at,
            }
            .save(dir)?;
        }

        Ok(InitReport {
            total_feedback_entries: assembly.records.len(),
            skipped_records: assembly.skipped.len(),
            total_chunks: ids.len(),
            skipped_fields: chunked.skipped.len(),
            embeddings_generated: vectors.len(),
            degraded_embeddings: degraded,
            index_count,
            initialized_at,
        })
    }

    /// Answer a query. Never fails: pipeline errors become an apology with
    /// `metadata.query_processed == false`.
    #[instrument(skip(self), fields(query_len = query.len()))]
    pub async fn process_query(&self, query: &str) -> RagResponse {
        let query = query.trim();
        if query.is_empty() {
            return RagResponse::canned(EMPTY_QUERY_ANSWER, Metadata::new(), 0);
        }

        match self.answer(query).await {
            Ok(response) => response,
            Err(e) => {
                error!("Query failed: {}", e);
                RagResponse::failed(e)
            }
        }
    }

    async fn answer(&self, query: &str) -> AppResult<RagResponse> {
        self.ensure_ready().await?;
        info!("Processing query: {}", query);

        let filters = self.analyzer.extract_filters(query);
        let vector = self.gateway.embed_query(query).await?;
        let (hits, filters_applied) = self.search(&vector, filters).await?;

        let total_found = hits.len();
        let relevant = aggregate::relevant_hits(&hits, self.options.retrieval.similarity_threshold);
        let groups = aggregate::group(&relevant);
        if groups.is_empty() {
            info!("No relevant feedback found");
            return Ok(RagResponse::canned(NO_RESULTS_ANSWER, filters_applied, total_found));
        }

        let prompt = self.composer.compose(query, &groups)?;
        let answer = parse_reply(self.generate(&prompt).await);

        Ok(RagResponse {
            answer,
            sources: groups.iter().map(SourceRef::from_group).collect(),
            metadata: QueryMetadata {
                total_found,
                relevant_count: relevant.len(),
                filters_applied,
                query_processed: true,
                error: None,
            },
        })
    }

    /// Filtered search first; when the filters leave nothing, one
    /// unfiltered retry. Returns the filters the hits were found with.
    async fn search(
        &self,
        vector: &[f32],
        filters: Metadata,
    ) -> AppResult<(Vec<RetrievalHit>, Metadata)> {
        let top_k = self.options.retrieval.top_k;

        if let Some(clause) = WhereClause::from_filters(&filters) {
            let hits = self.index.query(vector, top_k, Some(&clause)).await?;
            if !hits.is_empty() {
                debug!(hits = hits.len(), ?filters, "Filtered search");
                return Ok((hits, filters));
            }
            info!(?filters, "Filtered search found nothing, searching without filters");
        }

        let hits = self.index.query(vector, top_k, None).await?;
        debug!(hits = hits.len(), "Unfiltered search");
        Ok((hits, Metadata::new()))
    }

    async fn generate(&self, prompt: &BuiltPrompt) -> AppResult<LlmResponse> {
        let settings = &self.options.generator;
        let mut request = LlmRequest::new(prompt.user.clone(), settings.model.clone())
            .with_max_tokens(settings.max_tokens)
            .with_temperature(settings.temperature)
            .with_top_p(settings.top_p);
        if let Some(system) = &prompt.system {
            request = request.with_system(system.clone());
        }

        debug!(model = %settings.model, "Generating answer");
        complete_with_retry(self.llm.as_ref(), &request, &settings.retry).await
    }

    /// Make the service queryable.
    ///
    /// A non-empty persisted index built with the current embedder counts
    /// as ready. Otherwise the index is rebuilt when auto-initialization is
    /// enabled.
    async fn ensure_ready(&self) -> AppResult<()> {
        if self.is_ready() {
            return Ok(());
        }

        let count = self.index.count().await?;
        if count > 0 {
            match self.manifest_mismatch()? {
                None => {
                    info!(entries = count, "Using persisted feedback index");
                    self.ready.store(true, Ordering::SeqCst);
                    return Ok(());
                }
                Some(reason) => warn!("Persisted index is stale: {}", reason),
            }
        }

        if !self.options.retrieval.auto_initialize {
            return Err(AppError::Knowledge(
                "The feedback index is not ready. Run 'insight index' first.".to_string(),
            ));
        }

        info!("Feedback index not ready, initializing");
        self.initialize(&ProgressReporter::noop()).await?;
        Ok(())
    }

    /// Why the persisted index cannot serve the current embedder, if it
    /// cannot. An index without a manifest is trusted.
    fn manifest_mismatch(&self) -> AppResult<Option<String>> {
        let Some(dir) = &self.options.manifest_dir else {
            return Ok(None);
        };

        Ok(IndexManifest::load(dir)?.and_then(|manifest| {
            manifest.mismatch(
                self.gateway.provider_name(),
                self.gateway.model_name(),
                self.gateway.dimensions(),
            )
        }))
    }

    /// Empty the index and forget the manifest.
    pub async fn clear(&self) -> AppResult<()> {
        self.index.clear().await?;
        if let Some(dir) = &self.options.manifest_dir {
            IndexManifest::remove(dir)?;
        }
        self.ready.store(false, Ordering::SeqCst);
        info!("Feedback index cleared");
        Ok(())
    }

    pub async fn status(&self) -> SystemStatus {
        let mut problems = Vec::new();

        let (total_chunks, index_ok) = match self.index.count().await {
            Ok(count) => (count, true),
            Err(e) => {
                problems.push(format!("index: {}", e));
                (0, false)
            }
        };

        let store_ok = match self.store.fetch_all(EntityKind::FeedbackLog).await {
            Ok(logs) if logs.is_empty() => {
                problems.push(format!("record store: no feedback logs in {}", self.store.name()));
                false
            }
            Ok(_) => true,
            Err(e) => {
                problems.push(format!("record store: {}", e));
                false
            }
        };

        let manifest = match &self.options.manifest_dir {
            Some(dir) => IndexManifest::load(dir).unwrap_or_else(|e| {
                problems.push(format!("manifest: {}", e));
                None
            }),
            None => None,
        };
        let mismatch = manifest.as_ref().and_then(|m| {
            m.mismatch(
                self.gateway.provider_name(),
                self.gateway.model_name(),
                self.gateway.dimensions(),
            )
        });
        if let Some(reason) = &mismatch {
            problems.push(format!("embedding: {}", reason));
        }

        SystemStatus {
            initialized: self.is_ready() || (index_ok && total_chunks > 0 && mismatch.is_none()),
            index: IndexStatus {
                total_chunks,
                collection_name: self.options.collection.clone(),
                backend: self.index.backend().to_string(),
                location: self.index.location(),
                built_with: manifest
                    .as_ref()
                    .map(|m| format!("{}/{}", m.provider, m.model)),
                indexed_at: manifest.as_ref().map(|m| m.indexed_at),
            },
            services: ServiceStatus {
                record_store: ServiceState::from_ok(store_ok),
                embedding: ServiceState::from_ok(mismatch.is_none()),
                generator: ServiceState::Ready,
                index: ServiceState::from_ok(index_ok),
            },
            problems,
        }
    }
}
