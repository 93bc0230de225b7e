//! Hybrid search pipeline orchestrator.
//!
//! The [`SearchPipeline`] runs one query through normalization, dual
//! retrieval, rank fusion, chunk materialization, boosting, deduplication,
//! optional reranking, and per-source aggregation.
//!
//! # Example
//!
//! ```rust,ignore
//! use kb_search::{InMemoryStore, SearchConfig, SearchPipeline, QueryPart};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let pipeline = SearchPipeline::builder()
//!     .dense_retriever(Arc::new(my_vector_index))
//!     .lexical_retriever(store.clone())
//!     .chunk_store(store.clone())
//!     .source_store(store)
//!     .build()?;
//!
//! let results = pipeline
//!     .search(&[QueryPart::text("machine learning ethics")], &modalities, &filters, &config)
//!     .await?;
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, warn};

use crate::aggregate::{DefaultResultBuilder, ResultBuilder, aggregate};
use crate::boost::{apply_source_boosts, apply_term_boost};
use crate::config::{PipelineSettings, ResolvedConfig, SearchConfig};
use crate::deadline::Deadline;
use crate::dedup::deduplicate_by_source;
use crate::document::{
    ChunkId, QueryPart, ScoredChunk, SearchFilters, SearchResult, SourceId, SourceMeta,
    sort_by_score,
};
use crate::error::{Result, SearchError};
use crate::fusion::{reciprocal_rank_fusion, top_n};
use crate::hyde::HypotheticalDocumentGenerator;
use crate::query::{NormalizedQuery, QueryNormalizer, QueryTerms};
use crate::reranker::Reranker;
use crate::retriever::{RetrievalRequest, Retriever, ScoreMap};
use crate::store::{ChunkStore, SourceStore};

/// The hybrid search pipeline.
///
/// Holds no per-query state; one instance serves concurrent queries.
/// Construct one via [`SearchPipeline::builder()`].
pub struct SearchPipeline {
    settings: PipelineSettings,
    normalizer: QueryNormalizer,
    dense: Arc<dyn Retriever>,
    lexical: Option<Arc<dyn Retriever>>,
    chunks: Arc<dyn ChunkStore>,
    sources: Arc<dyn SourceStore>,
    reranker: Option<Arc<dyn Reranker>>,
    result_builder: Arc<dyn ResultBuilder>,
    clock: fn() -> DateTime<Utc>,
}

impl SearchPipeline {
    /// Create a new [`SearchPipelineBuilder`].
    pub fn builder() -> SearchPipelineBuilder {
        SearchPipelineBuilder::default()
    }

    /// Return a reference to the pipeline settings.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Search for `inputs`, returning at most `config.limit` results, one per
    /// source, ordered by descending `search_score`.
    ///
    /// Only dense retrieval and chunk materialization can fail the query.
    /// Lexical retrieval, HyDE, source metadata, reranking and per-source
    /// result building degrade to the best available data and log a warning.
    /// Every stage runs within the overall timeout. Once it passes, the
    /// optional stages still ahead are skipped and results that are not yet
    /// built are dropped.
    ///
    /// # Errors
    ///
    /// - [`SearchError::ConfigError`] if `config` is invalid.
    /// - [`SearchError::Timeout`] if dense retrieval or chunk fetching times out.
    /// - [`SearchError::PipelineError`] if dense retrieval or chunk fetching fails.
    pub async fn search(
        &self,
        inputs: &[QueryPart],
        modalities: &BTreeSet<String>,
        filters: &SearchFilters,
        config: &SearchConfig,
    ) -> Result<Vec<SearchResult>> {
        config.validate()?;
        let started = Instant::now();
        let resolved = config.resolve(&self.settings.flags);
        let deadline = Deadline::after(resolved.timeout);

        // 1. Normalize
        let query = self.normalizer.normalize(inputs, modalities, &resolved, &deadline).await;
        debug!(
            modalities = ?query.modalities,
            term_text = %query.term_text,
            hyde = query.hyde_document.is_some(),
            "normalized query"
        );

        // 2. Retrieve
        let internal_limit = resolved.limit.saturating_mul(self.settings.candidate_multiplier);
        let (dense_scores, lexical_scores) =
            self.retrieve(&query, filters, &resolved, internal_limit, &deadline).await?;

        // 3. Fuse
        let fused = match &lexical_scores {
            Some(lexical) => {
                reciprocal_rank_fusion(&[&dense_scores, lexical], self.settings.rrf_k)
            }
            None => reciprocal_rank_fusion(&[&dense_scores], self.settings.rrf_k),
        };
        if fused.is_empty() {
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "no candidates found");
            return Ok(Vec::new());
        }

        // 4. Materialize
        let rerank_active = resolved.use_reranking && self.reranker.is_some();
        let window = if rerank_active {
            resolved.limit.saturating_mul(self.settings.rerank_window_multiplier)
        } else {
            resolved.limit
        };
        let mut chunks = self.materialize(top_n(&fused, window), &deadline).await?;

        // 5. Boost
        let terms = QueryTerms::from_text(&query.term_text);
        apply_term_boost(&mut chunks, &terms);
        let source_ids = distinct_sources(&chunks);
        let sources = self.fetch_sources(&source_ids, &deadline).await;
        apply_source_boosts(&mut chunks, &terms, &sources, (self.clock)());
        sort_by_score(&mut chunks);

        // 6. Deduplicate
        if self.settings.deduplicate {
            chunks = deduplicate_by_source(chunks);
        }

        // 7. Rerank
        if rerank_active {
            chunks = self.rerank(&query.raw_text, chunks, resolved.limit, &deadline).await;
        }

        // 8. Aggregate
        let results = aggregate(
            self.result_builder.as_ref(),
            chunks,
            &sources,
            resolved.limit,
            resolved.previews,
            deadline.remaining().unwrap_or(Duration::ZERO),
        )
        .await;

        info!(
            result_count = results.len(),
            candidate_count = fused.len(),
            lexical = lexical_scores.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search completed"
        );
        Ok(results)
    }

    /// Run dense and, when enabled, lexical retrieval concurrently.
    ///
    /// A lexical failure never cancels or fails the dense side.
    async fn retrieve(
        &self,
        query: &NormalizedQuery,
        filters: &SearchFilters,
        config: &ResolvedConfig,
        limit: usize,
        deadline: &Deadline,
    ) -> Result<(ScoreMap, Option<ScoreMap>)> {
        let budget = deadline.remaining().ok_or(SearchError::Timeout {
            stage: "dense_retrieval",
            after: config.timeout,
        })?;

        let dense_request = RetrievalRequest {
            inputs: &query.dense_inputs,
            modalities: &query.modalities,
            limit,
            filters,
            timeout: budget,
        };
        let lexical_budget = budget.min(self.settings.lexical_timeout()).min(budget / 2);
        let lexical_request = RetrievalRequest {
            inputs: &query.lexical_inputs,
            timeout: lexical_budget,
            ..dense_request
        };

        let dense = run_retriever(self.dense.as_ref(), &dense_request, "dense_retrieval");
        let lexical = async {
            match &self.lexical {
                Some(retriever) if config.use_bm25 => Some(
                    run_retriever(retriever.as_ref(), &lexical_request, "lexical_retrieval").await,
                ),
                _ => None,
            }
        };
        let (dense, lexical) = tokio::join!(dense, lexical);

        let dense = dense.map_err(|e| {
            error!(retriever = self.dense.name(), error = %e, "dense retrieval failed");
            if e.is_timeout() {
                e
            } else {
                SearchError::PipelineError(format!("dense retrieval failed: {e}"))
            }
        })?;
        debug!(candidates = dense.len(), "dense retrieval finished");

        let lexical = match lexical {
            Some(Ok(scores)) => {
                debug!(candidates = scores.len(), "lexical retrieval finished");
                Some(scores)
            }
            Some(Err(e)) if e.is_timeout() => {
                info!(error = %e, "lexical retrieval timed out, using dense results only");
                None
            }
            Some(Err(e)) => {
                warn!(error = %e, "lexical retrieval failed, using dense results only");
                None
            }
            None => None,
        };
        Ok((dense, lexical))
    }

    /// Fetch the chunk records for the top fused ids, scored by fused score.
    ///
    /// Ids without a record are dropped. The result keeps fused order.
    async fn materialize(
        &self,
        top: Vec<(ChunkId, f64)>,
        deadline: &Deadline,
    ) -> Result<Vec<ScoredChunk>> {
        let ids: Vec<ChunkId> = top.iter().map(|(id, _)| id.clone()).collect();
        let Some(budget) = deadline.budget(self.settings.store_timeout()) else {
            error!("deadline reached before chunk fetch");
            return Err(SearchError::Timeout { stage: "chunk_fetch", after: Duration::ZERO });
        };
        let fetched = timeout(budget, self.chunks.fetch_chunks(&ids))
            .await
            .map_err(|_| {
                error!(?budget, "chunk fetch timed out");
                SearchError::Timeout { stage: "chunk_fetch", after: budget }
            })?
            .map_err(|e| {
                error!(error = %e, "chunk fetch failed");
                SearchError::PipelineError(format!("chunk fetch failed: {e}"))
            })?;

        let mut by_id: HashMap<ChunkId, _> =
            fetched.into_iter().map(|chunk| (chunk.id.clone(), chunk)).collect();
        let chunks: Vec<ScoredChunk> = top
            .into_iter()
            .filter_map(|(id, score)| by_id.remove(&id).map(|chunk| ScoredChunk::new(chunk, score)))
            .collect();
        if chunks.len() < ids.len() {
            debug!(
                requested = ids.len(),
                found = chunks.len(),
                "dropped ids without chunk records"
            );
        }
        Ok(chunks)
    }

    /// Fetch metadata for `ids` once. Failures yield an empty map.
    async fn fetch_sources(
        &self,
        ids: &[SourceId],
        deadline: &Deadline,
    ) -> HashMap<SourceId, SourceMeta> {
        if ids.is_empty() {
            return HashMap::new();
        }
        let Some(budget) = deadline.budget(self.settings.store_timeout()) else {
            warn!("deadline reached before source fetch, skipping source boosts");
            return HashMap::new();
        };
        match timeout(budget, self.sources.fetch_sources(ids)).await {
            Ok(Ok(sources)) => sources,
            Ok(Err(e)) => {
                warn!(error = %e, "source fetch failed, skipping source boosts");
                HashMap::new()
            }
            Err(_) => {
                warn!(?budget, "source fetch timed out, skipping source boosts");
                HashMap::new()
            }
        }
    }

    /// Rerank `chunks`, falling back to their current order on failure.
    async fn rerank(
        &self,
        query: &str,
        chunks: Vec<ScoredChunk>,
        limit: usize,
        deadline: &Deadline,
    ) -> Vec<ScoredChunk> {
        let Some(reranker) = &self.reranker else {
            return chunks;
        };
        if query.trim().is_empty() || chunks.is_empty() {
            return chunks;
        }
        let Some(budget) = deadline.budget(self.settings.rerank_timeout()) else {
            warn!("deadline reached before reranking, keeping fused order");
            return chunks;
        };

        let fallback = chunks.clone();
        let model = self.settings.rerank_model.as_str();
        match timeout(budget, reranker.rerank(query, chunks, model, limit)).await {
            Ok(Ok(mut reranked)) => {
                let replaced = clamp_non_finite(&mut reranked);
                if replaced > 0 {
                    warn!(
                        reranker = reranker.name(),
                        replaced,
                        "reranker returned non-finite scores"
                    );
                }
                debug!(reranker = reranker.name(), kept = reranked.len(), "reranked candidates");
                reranked
            }
            Ok(Err(e)) => {
                warn!(
                    reranker = reranker.name(),
                    error = %e,
                    "reranking failed, keeping fused order"
                );
                fallback
            }
            Err(_) => {
                warn!(
                    reranker = reranker.name(),
                    ?budget,
                    "reranking timed out, keeping fused order"
                );
                fallback
            }
        }
    }
}

async fn run_retriever(
    retriever: &dyn Retriever,
    request: &RetrievalRequest<'_>,
    stage: &'static str,
) -> Result<ScoreMap> {
    match timeout(request.timeout, retriever.retrieve(request)).await {
        Ok(scores) => scores,
        Err(_) => Err(SearchError::Timeout { stage, after: request.timeout }),
    }
}

/// Replace non-finite scores with the lowest finite score in `chunks`, or
/// zero when there is none. Returns how many were replaced.
fn clamp_non_finite(chunks: &mut [ScoredChunk]) -> usize {
    let floor = chunks
        .iter()
        .map(|c| c.score)
        .filter(|score| score.is_finite())
        .reduce(f64::min)
        .unwrap_or(0.0);
    let mut replaced = 0;
    for chunk in chunks.iter_mut().filter(|c| !c.score.is_finite()) {
        chunk.score = floor;
        replaced += 1;
    }
    replaced
}

fn distinct_sources(chunks: &[ScoredChunk]) -> Vec<SourceId> {
    let mut ids: Vec<SourceId> = chunks.iter().map(ScoredChunk::source_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Builder for constructing a [`SearchPipeline`].
///
/// A dense retriever, a chunk store and a source store are required.
/// Everything else is optional. Call [`build()`](SearchPipelineBuilder::build)
/// to validate and produce the pipeline.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = SearchPipeline::builder()
///     .settings(PipelineSettings::default())
///     .dense_retriever(Arc::new(dense))
///     .lexical_retriever(Arc::new(bm25))      // optional
///     .chunk_store(store.clone())
///     .source_store(store)
///     .reranker(Arc::new(cross_encoder))      // optional
///     .hyde_generator(Arc::new(generator))    // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct SearchPipelineBuilder {
    settings: Option<PipelineSettings>,
    dense: Option<Arc<dyn Retriever>>,
    lexical: Option<Arc<dyn Retriever>>,
    chunks: Option<Arc<dyn ChunkStore>>,
    sources: Option<Arc<dyn SourceStore>>,
    reranker: Option<Arc<dyn Reranker>>,
    hyde: Option<Arc<dyn HypotheticalDocumentGenerator>>,
    result_builder: Option<Arc<dyn ResultBuilder>>,
    clock: Option<fn() -> DateTime<Utc>>,
}

impl SearchPipelineBuilder {
    /// Set the pipeline settings. Defaults to [`PipelineSettings::default()`].
    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Set the dense (vector) retriever.
    pub fn dense_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.dense = Some(retriever);
        self
    }

    /// Set an optional lexical (BM25) retriever.
    pub fn lexical_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.lexical = Some(retriever);
        self
    }

    /// Set the chunk record store.
    pub fn chunk_store(mut self, store: Arc<dyn ChunkStore>) -> Self {
        self.chunks = Some(store);
        self
    }

    /// Set the source metadata store.
    pub fn source_store(mut self, store: Arc<dyn SourceStore>) -> Self {
        self.sources = Some(store);
        self
    }

    /// Set an optional cross-encoder reranker.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Set an optional hypothetical-document generator.
    pub fn hyde_generator(mut self, generator: Arc<dyn HypotheticalDocumentGenerator>) -> Self {
        self.hyde = Some(generator);
        self
    }

    /// Replace the [`DefaultResultBuilder`].
    pub fn result_builder(mut self, builder: Arc<dyn ResultBuilder>) -> Self {
        self.result_builder = Some(builder);
        self
    }

    /// Replace the wall clock used for recency boosting.
    pub fn clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the [`SearchPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ConfigError`] if any required field is missing
    /// or the settings are invalid.
    pub fn build(self) -> Result<SearchPipeline> {
        let settings = self.settings.unwrap_or_default();
        settings.validate()?;
        let dense = self
            .dense
            .ok_or_else(|| SearchError::ConfigError("dense_retriever is required".to_string()))?;
        let chunks = self
            .chunks
            .ok_or_else(|| SearchError::ConfigError("chunk_store is required".to_string()))?;
        let sources = self
            .sources
            .ok_or_else(|| SearchError::ConfigError("source_store is required".to_string()))?;

        let mut normalizer = QueryNormalizer::new().with_min_hyde_tokens(settings.min_hyde_tokens);
        if let Some(generator) = self.hyde {
            normalizer = normalizer.with_hyde(generator, settings.hyde_timeout());
        }

        Ok(SearchPipeline {
            normalizer,
            dense,
            lexical: self.lexical,
            chunks,
            sources,
            reranker: self.reranker,
            result_builder: self.result_builder.unwrap_or_else(|| Arc::new(DefaultResultBuilder)),
            clock: self.clock.unwrap_or(Utc::now),
            settings,
        })
    }
}

impl std::fmt::Debug for SearchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPipeline")
            .field("settings", &self.settings)
            .field("dense", &self.dense.name())
            .field("lexical", &self.lexical.as_ref().map(|r| r.name().to_string()))
            .field("reranker", &self.reranker.as_ref().map(|r| r.name().to_string()))
            .finish_non_exhaustive()
    }
}
