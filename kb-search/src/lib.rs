//! # kb-search
//!
//! Hybrid retrieval and ranking core for a personal knowledge-base search
//! API.
//!
//! ## Overview
//!
//! A query flows through these stages:
//!
//! 1. [`QueryNormalizer`]: modality hints, meta-language stripping, synonym
//!    expansion and optional hypothetical-document expansion (HyDE).
//! 2. Dual retrieval: a dense [`Retriever`] always, a lexical one when
//!    enabled, both asked for `limit × 5` candidates.
//! 3. [`reciprocal_rank_fusion`] with `K = 60`.
//! 4. Chunk materialization through a [`ChunkStore`].
//! 5. Term, title, popularity and recency boosts ([`boost`]).
//! 6. Best chunk per source ([`deduplicate_by_source`]).
//! 7. Optional [`Reranker`] pass.
//! 8. One [`SearchResult`] per source, sorted and truncated.
//!
//! The external indexes, stores and models are consumed through traits;
//! [`InMemoryStore`] implements the store traits and a keyword retriever
//! for development and tests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//!
//! use kb_search::{InMemoryStore, QueryPart, SearchConfig, SearchFilters, SearchPipeline};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let pipeline = SearchPipeline::builder()
//!     .dense_retriever(Arc::new(my_vector_index))
//!     .lexical_retriever(store.clone())
//!     .chunk_store(store.clone())
//!     .source_store(store)
//!     .build()?;
//!
//! let config = SearchConfig::builder().limit(5).build()?;
//! let results = pipeline
//!     .search(
//!         &[QueryPart::text("that whole AI safety thing")],
//!         &BTreeSet::new(),
//!         &SearchFilters::new(),
//!         &config,
//!     )
//!     .await?;
//! ```

pub mod aggregate;
pub mod boost;
pub mod config;
pub mod deadline;
pub mod dedup;
pub mod document;
pub mod error;
pub mod fusion;
pub mod hyde;
pub mod inmemory;
pub mod pipeline;
pub mod query;
pub mod reranker;
pub mod retriever;
pub mod store;

pub use aggregate::{DefaultResultBuilder, PREVIEW_CHARS, ResultBuilder};
pub use config::{
    FeatureFlags, MAX_LIMIT, PipelineSettings, PipelineSettingsBuilder, ResolvedConfig,
    SearchConfig, SearchConfigBuilder,
};
pub use deadline::Deadline;
pub use dedup::deduplicate_by_source;
pub use document::{
    Chunk, ChunkId, QueryPart, ResultChunk, ScoredChunk, SearchFilters, SearchResult, SourceId,
    SourceMeta, SourceTimestamp,
};
pub use error::{Result, SearchError};
pub use fusion::{DEFAULT_RRF_K, reciprocal_rank_fusion};
pub use hyde::{HypotheticalDocumentGenerator, TemplateHydeGenerator};
pub use inmemory::InMemoryStore;
pub use pipeline::{SearchPipeline, SearchPipelineBuilder};
pub use query::{NormalizedQuery, QueryNormalizer, QueryTerms};
pub use reranker::{NoOpReranker, Reranker};
pub use retriever::{RetrievalRequest, Retriever, ScoreMap};
pub use store::{ChunkStore, SourceStore};
