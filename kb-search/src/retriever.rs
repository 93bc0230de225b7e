//! Retriever trait for candidate generation.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;

use crate::document::{ChunkId, QueryPart, SearchFilters};
use crate::error::Result;

/// Raw relevance scores keyed by chunk id.
///
/// Scores are retriever-specific and not comparable across retrievers;
/// only their order within one map is meaningful.
pub type ScoreMap = HashMap<ChunkId, f64>;

/// Everything a retriever needs to produce candidates for one query.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalRequest<'a> {
    /// Query parts to search with.
    pub inputs: &'a [QueryPart],
    /// Modalities to restrict the search to. Empty means all.
    pub modalities: &'a BTreeSet<String>,
    /// Maximum number of candidates to return.
    pub limit: usize,
    /// Opaque filter criteria, forwarded verbatim.
    pub filters: &'a SearchFilters,
    /// Time the retriever may spend.
    pub timeout: Duration,
}

/// A candidate source backed by some index (vector, BM25, ...).
///
/// The pipeline holds one dense retriever (always queried) and optionally
/// one lexical retriever (queried when lexical search is enabled).
///
/// # Example
///
/// ```rust,ignore
/// use kb_search::{Retriever, RetrievalRequest};
///
/// let scores = retriever.retrieve(&request).await?;
/// for (id, score) in &scores {
///     println!("{id}: {score}");
/// }
/// ```
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Return up to `request.limit` candidates with raw relevance scores.
    ///
    /// Implementations that run out of time should return
    /// [`SearchError::Timeout`](crate::SearchError::Timeout).
    async fn retrieve(&self, request: &RetrievalRequest<'_>) -> Result<ScoreMap>;
}
