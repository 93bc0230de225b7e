//! Group surviving chunks into one result per source.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::timeout;
use tracing::warn;

use crate::document::{
    ResultChunk, ScoredChunk, SearchResult, SourceId, SourceMeta, descending, sort_by_score,
};
use crate::error::{Result, SearchError};

/// Maximum characters of chunk content in a preview.
pub const PREVIEW_CHARS: usize = 400;

/// Builds the source-level result for one source and its chunks.
///
/// Owns the choice of `search_score`; the pipeline only sorts by it.
#[async_trait]
pub trait ResultBuilder: Send + Sync {
    /// Build the result for `source` from its chunks, best first.
    async fn build(
        &self,
        source: &SourceMeta,
        chunks: Vec<ScoredChunk>,
        previews: bool,
    ) -> Result<SearchResult>;
}

/// Scores a source by its best chunk and previews chunk text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResultBuilder;

fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => content[..end].to_string(),
        None => content.to_string(),
    }
}

#[async_trait]
impl ResultBuilder for DefaultResultBuilder {
    async fn build(
        &self,
        source: &SourceMeta,
        chunks: Vec<ScoredChunk>,
        previews: bool,
    ) -> Result<SearchResult> {
        let search_score = chunks
            .iter()
            .map(|c| c.score)
            .filter(|score| score.is_finite())
            .reduce(f64::max)
            .unwrap_or(0.0);
        let chunks = chunks
            .into_iter()
            .map(|scored| ResultChunk {
                preview: if previews { scored.chunk.content.as_deref().map(preview) } else { None },
                id: scored.chunk.id,
                score: scored.score,
                file_paths: scored.chunk.file_paths,
            })
            .collect();
        Ok(SearchResult {
            source_id: source.id,
            title: source.title.clone(),
            inserted_at: source.inserted_at.map(|ts| ts.to_utc()),
            search_score,
            chunks,
        })
    }
}

/// Group `chunks` by source, build one result per source, sort by
/// `search_score` descending and keep the first `limit`.
///
/// Sources missing from `sources` are built from a bare [`SourceMeta`].
/// A source whose result fails to build, or is not built within `budget`,
/// is dropped with a warning.
pub async fn aggregate(
    builder: &dyn ResultBuilder,
    chunks: Vec<ScoredChunk>,
    sources: &HashMap<SourceId, SourceMeta>,
    limit: usize,
    previews: bool,
    budget: Duration,
) -> Vec<SearchResult> {
    let mut order: Vec<SourceId> = Vec::new();
    let mut groups: HashMap<SourceId, Vec<ScoredChunk>> = HashMap::new();
    for scored in chunks {
        let source_id = scored.source_id();
        groups
            .entry(source_id)
            .or_insert_with(|| {
                order.push(source_id);
                Vec::new()
            })
            .push(scored);
    }

    let metas: Vec<SourceMeta> = order
        .iter()
        .map(|id| sources.get(id).cloned().unwrap_or_else(|| SourceMeta::new(*id)))
        .collect();
    let builds = metas.iter().map(|meta| {
        let mut group = groups.remove(&meta.id).unwrap_or_default();
        sort_by_score(&mut group);
        async move {
            timeout(budget, builder.build(meta, group, previews)).await.unwrap_or_else(|_| {
                Err(SearchError::Timeout { stage: "result_build", after: budget })
            })
        }
    });

    let mut results: Vec<SearchResult> = join_all(builds)
        .await
        .into_iter()
        .zip(&order)
        .filter_map(|(built, source_id)| match built {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(source_id, error = %e, "failed to build search result, dropping source");
                None
            }
        })
        .collect();

    results.sort_by(|a, b| descending(a.search_score, b.search_score));
    results.truncate(limit);
    results
}
