//! In-memory chunk and source store with a keyword retriever.
//!
//! This module provides [`InMemoryStore`], a dependency-free backend
//! holding chunks and sources in `HashMap`s protected by a
//! `tokio::sync::RwLock`. It is suitable for development, testing, and
//! small collections.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, ChunkId, QueryPart, SourceId, SourceMeta};
use crate::error::Result;
use crate::query::QueryTerms;
use crate::retriever::{RetrievalRequest, Retriever, ScoreMap};
use crate::store::{ChunkStore, SourceStore};

#[derive(Debug, Clone)]
struct StoredChunk {
    chunk: Chunk,
    modality: Option<String>,
}

/// An in-memory store implementing [`ChunkStore`], [`SourceStore`], and a
/// keyword-overlap [`Retriever`].
///
/// The retriever scores a chunk by the number of distinct query terms its
/// content contains, a crude stand-in for BM25. It honors modality
/// restrictions but ignores opaque filters.
///
/// # Example
///
/// ```rust,ignore
/// use kb_search::{Chunk, InMemoryStore, SourceMeta};
///
/// let store = InMemoryStore::new();
/// store.insert_source(SourceMeta::new(1).with_title("Notes")).await;
/// store.insert_chunk(Chunk::new("c1", 1, "hello world"), Some("blog")).await;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    chunks: RwLock<HashMap<ChunkId, StoredChunk>>,
    sources: RwLock<HashMap<SourceId, SourceMeta>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a chunk, optionally tagged with a modality.
    pub async fn insert_chunk(&self, chunk: Chunk, modality: Option<&str>) {
        let stored = StoredChunk { modality: modality.map(str::to_string), chunk };
        self.chunks.write().await.insert(stored.chunk.id.clone(), stored);
    }

    /// Insert or replace a source.
    pub async fn insert_source(&self, source: SourceMeta) {
        self.sources.write().await.insert(source.id, source);
    }

    /// Remove a chunk. Returns whether it existed.
    pub async fn remove_chunk(&self, id: &ChunkId) -> bool {
        self.chunks.write().await.remove(id).is_some()
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn fetch_chunks(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        let chunks = self.chunks.read().await;
        Ok(ids.iter().filter_map(|id| chunks.get(id)).map(|stored| stored.chunk.clone()).collect())
    }
}

#[async_trait]
impl SourceStore for InMemoryStore {
    async fn fetch_sources(&self, ids: &[SourceId]) -> Result<HashMap<SourceId, SourceMeta>> {
        let sources = self.sources.read().await;
        Ok(ids.iter().filter_map(|id| sources.get(id).map(|meta| (*id, meta.clone()))).collect())
    }
}

#[async_trait]
impl Retriever for InMemoryStore {
    fn name(&self) -> &str {
        "inmemory-keyword"
    }

    async fn retrieve(&self, request: &RetrievalRequest<'_>) -> Result<ScoreMap> {
        let text: Vec<&str> = request.inputs.iter().filter_map(QueryPart::as_text).collect();
        let terms = QueryTerms::from_text(&text.join(" "));
        if terms.is_empty() || request.limit == 0 {
            return Ok(ScoreMap::new());
        }

        let chunks = self.chunks.read().await;
        let mut scored: Vec<(&ChunkId, f64)> = chunks
            .values()
            .filter(|stored| {
                request.modalities.is_empty()
                    || stored.modality.as_ref().is_some_and(|m| request.modalities.contains(m))
            })
            .filter_map(|stored| {
                let content = stored.chunk.content.as_deref()?;
                let matches = terms.count_matches(content);
                (matches > 0).then_some((&stored.chunk.id, matches as f64))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        scored.truncate(request.limit);
        Ok(scored.into_iter().map(|(id, score)| (id.clone(), score)).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use super::*;
    use crate::document::SearchFilters;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_source(SourceMeta::new(1).with_title("Rationality")).await;
        store.insert_chunk(Chunk::new("c1", 1, "rationality and bayes"), Some("forum")).await;
        store.insert_chunk(Chunk::new("c2", 2, "bayes theorem proofs"), Some("book")).await;
        store.insert_chunk(Chunk::new("c3", 2, "gardening"), Some("book")).await;
        store
    }

    fn request<'a>(
        inputs: &'a [QueryPart],
        modalities: &'a BTreeSet<String>,
        filters: &'a SearchFilters,
        limit: usize,
    ) -> RetrievalRequest<'a> {
        RetrievalRequest { inputs, modalities, limit, filters, timeout: Duration::from_secs(1) }
    }

    #[tokio::test]
    async fn fetch_omits_unknown_ids() {
        let store = seeded().await;
        let chunks = store.fetch_chunks(&["c1".into(), "missing".into()]).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id.as_str(), "c1");

        let sources = store.fetch_sources(&[1, 99]).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[&1].title.as_deref(), Some("Rationality"));
    }

    #[tokio::test]
    async fn keyword_retrieval_ranks_by_term_overlap() {
        let store = seeded().await;
        let inputs = [QueryPart::text("rationality bayes")];
        let modalities = BTreeSet::new();
        let filters = SearchFilters::new();
        let scores = store.retrieve(&request(&inputs, &modalities, &filters, 10)).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[&ChunkId::from("c1")], 2.0);
        assert_eq!(scores[&ChunkId::from("c2")], 1.0);
    }

    #[tokio::test]
    async fn keyword_retrieval_honors_modalities_and_limit() {
        let store = seeded().await;
        let inputs = [QueryPart::text("bayes")];
        let filters = SearchFilters::new();

        let books = BTreeSet::from(["book".to_string()]);
        let scores = store.retrieve(&request(&inputs, &books, &filters, 10)).await.unwrap();
        assert_eq!(scores.keys().collect::<Vec<_>>(), vec![&ChunkId::from("c2")]);

        let all = BTreeSet::new();
        let scores = store.retrieve(&request(&inputs, &all, &filters, 1)).await.unwrap();
        assert_eq!(scores.len(), 1);
    }

    #[tokio::test]
    async fn remove_chunk_reports_presence() {
        let store = seeded().await;
        assert!(store.remove_chunk(&"c3".into()).await);
        assert!(!store.remove_chunk(&"c3".into()).await);
        assert_eq!(store.len().await, 2);
    }
}
