//! Reciprocal Rank Fusion: score = Σ 1/(k + rank_i)
//!
//! Combines the dense and lexical candidate lists into a single ranking
//! without normalizing their raw scores, which live on unrelated scales.
//! Only rank positions matter.

use std::collections::HashMap;

use crate::document::ChunkId;
use crate::retriever::ScoreMap;

/// The standard RRF damping constant.
pub const DEFAULT_RRF_K: u32 = 60;

/// Rank the ids of one retriever's results, 1-based, best first.
///
/// Higher raw scores rank first. NaN scores rank last; ties are broken by
/// chunk id so the ranking is deterministic.
pub fn rank(scores: &ScoreMap) -> Vec<(&ChunkId, usize)> {
    let mut ordered: Vec<(&ChunkId, f64)> = scores
        .iter()
        .map(|(id, score)| (id, if score.is_nan() { f64::NEG_INFINITY } else { *score }))
        .collect();
    ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ordered.into_iter().enumerate().map(|(i, (id, _))| (id, i + 1)).collect()
}

/// Fuse several retrievers' results.
///
/// `k` is the smoothing constant (default 60). Higher k flattens the gap
/// between top and lower ranks. Every id of every input appears in the
/// output exactly once.
pub fn reciprocal_rank_fusion(result_sets: &[&ScoreMap], k: u32) -> HashMap<ChunkId, f64> {
    let mut fused: HashMap<ChunkId, f64> = HashMap::new();
    for scores in result_sets {
        for (id, rank) in rank(scores) {
            *fused.entry(id.clone()).or_default() += 1.0 / (f64::from(k) + rank as f64);
        }
    }
    fused
}

/// The `n` best ids by fused score, best first. Ties are broken by id.
pub fn top_n(fused: &HashMap<ChunkId, f64>, n: usize) -> Vec<(ChunkId, f64)> {
    let mut ordered: Vec<(ChunkId, f64)> =
        fused.iter().map(|(id, score)| (id.clone(), *score)).collect();
    ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ordered.truncate(n);
    ordered
}
