//! Property tests for the in-memory store's keyword retrieval.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use kb_search::{
    Chunk, ChunkId, ChunkStore, InMemoryStore, QueryPart, QueryTerms, RetrievalRequest, Retriever,
    SearchFilters,
};
use proptest::prelude::*;

const WORDS: &[&str] = &["alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel"];

/// Generate chunk text from a small vocabulary so queries overlap.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(proptest::sample::select(WORDS), 1..6).prop_map(|w| w.join(" "))
}

fn arb_chunks() -> impl Strategy<Value = Vec<(String, i64, String)>> {
    proptest::collection::vec(("[a-z]{3,8}", 0i64..5, arb_text()), 1..20)
}

/// **Property: keyword scores count matched query terms and respect the limit**
/// *For any* stored chunks and query, every returned chunk contains at least one
/// query term, its score equals the number of distinct query terms it contains,
/// and at most `limit` chunks are returned.
mod prop_keyword_retrieval {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn scores_count_terms_and_respect_limit(
            chunks in arb_chunks(),
            query in arb_text(),
            limit in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (scores, stored) = rt.block_on(async {
                let store = InMemoryStore::new();
                let mut stored: HashMap<ChunkId, String> = HashMap::new();
                for (id, source_id, text) in &chunks {
                    let chunk = Chunk::new(id.as_str(), *source_id, text.as_str());
                    store.insert_chunk(chunk, None).await;
                    stored.insert(ChunkId::from(id.as_str()), text.clone());
                }

                let inputs = [QueryPart::text(query.clone())];
                let modalities = BTreeSet::new();
                let filters = SearchFilters::new();
                let request = RetrievalRequest {
                    inputs: &inputs,
                    modalities: &modalities,
                    limit,
                    filters: &filters,
                    timeout: Duration::from_secs(1),
                };
                (store.retrieve(&request).await.unwrap(), stored)
            });

            let terms = QueryTerms::from_text(&query);
            prop_assert!(scores.len() <= limit);
            for (id, score) in &scores {
                let text = &stored[id];
                let expected = terms.count_matches(text) as f64;
                prop_assert!(expected >= 1.0);
                prop_assert_eq!(*score, expected);
            }

            // Nothing left out scores higher than the lowest returned score.
            if let Some(lowest) = scores.values().copied().reduce(f64::min) {
                for (id, text) in &stored {
                    if !scores.contains_key(id) {
                        prop_assert!(terms.count_matches(text) as f64 <= lowest);
                    }
                }
            }
        }

        #[test]
        fn fetch_returns_only_stored_ids(
            chunks in arb_chunks(),
            extra in proptest::collection::vec("[A-Z]{4}", 0..5),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (fetched, unique) = rt.block_on(async {
                let store = InMemoryStore::new();
                for (id, source_id, text) in &chunks {
                    let chunk = Chunk::new(id.as_str(), *source_id, text.as_str());
                    store.insert_chunk(chunk, None).await;
                }
                let mut ids: Vec<ChunkId> =
                    chunks.iter().map(|(id, _, _)| ChunkId::from(id.as_str())).collect();
                ids.sort();
                ids.dedup();
                let unique = ids.len();
                ids.extend(extra.iter().map(|id| ChunkId::from(id.as_str())));
                (store.fetch_chunks(&ids).await.unwrap(), unique)
            });
            prop_assert_eq!(fetched.len(), unique);
        }
    }
}
