//! Collapse chunks to the best one per source.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::document::{ScoredChunk, SourceId, descending};

/// Keep only the highest-scoring chunk of each source.
///
/// The output is sorted by descending score. Among equal-scoring chunks of
/// one source, the first in input order wins. Applying this twice gives the
/// same result as applying it once.
pub fn deduplicate_by_source(chunks: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let mut best: HashMap<SourceId, ScoredChunk> = HashMap::with_capacity(chunks.len());
    for scored in chunks {
        match best.entry(scored.source_id()) {
            Entry::Occupied(mut slot) => {
                if scored.score > slot.get().score {
                    slot.insert(scored);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(scored);
            }
        }
    }
    let mut kept: Vec<ScoredChunk> = best.into_values().collect();
    kept.sort_by(|a, b| descending(a.score, b.score).then_with(|| a.chunk.id.cmp(&b.chunk.id)));
    kept
}
