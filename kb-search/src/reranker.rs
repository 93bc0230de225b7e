//! Reranker trait for cross-encoder re-scoring of the candidate window.

use async_trait::async_trait;

use crate::document::ScoredChunk;
use crate::error::Result;

/// A reranker that re-scores and reorders chunks against the query.
///
/// Implementations typically call a cross-encoder model, which scores each
/// (query, chunk) pair jointly. More accurate than first-pass retrieval but
/// too expensive to run over the whole index.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Rerank `chunks` for `query` using `model`.
    ///
    /// Returns at most `top_k` chunks, best first, with updated scores.
    async fn rerank(
        &self,
        query: &str,
        chunks: Vec<ScoredChunk>,
        model: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>>;
}

/// A no-op reranker that keeps the incoming order and truncates to `top_k`.
///
/// Useful as a default when no cross-encoder is available.
///
/// # Example
///
/// ```rust,ignore
/// use kb_search::NoOpReranker;
///
/// let reranker = NoOpReranker;
/// let reranked = reranker.rerank("query", chunks, "any", 5).await?;
/// // reranked == chunks[..5] (same order, same scores)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    fn name(&self) -> &str {
        "noop"
    }

    async fn rerank(
        &self,
        _query: &str,
        mut chunks: Vec<ScoredChunk>,
        _model: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        chunks.truncate(top_k);
        Ok(chunks)
    }
}
