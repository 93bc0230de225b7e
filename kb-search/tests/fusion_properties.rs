//! Property tests for rank fusion, boosting and deduplication.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, TimeZone, Utc};
use kb_search::boost::{popularity_multiplier, recency_boost};
use kb_search::fusion::{rank, top_n};
use kb_search::{
    Chunk, ChunkId, DEFAULT_RRF_K, ScoreMap, ScoredChunk, deduplicate_by_source,
    reciprocal_rank_fusion,
};
use proptest::prelude::*;

/// A score map over ids `c0..c{n}` with arbitrary finite scores.
fn arb_scores(max_len: usize) -> impl Strategy<Value = ScoreMap> {
    proptest::collection::hash_map(
        (0u32..40).prop_map(|i| ChunkId::new(format!("c{i}"))),
        -100.0f64..100.0,
        0..max_len,
    )
}

fn arb_scored_chunks() -> impl Strategy<Value = Vec<ScoredChunk>> {
    proptest::collection::vec((0u32..200, 0i64..8, 0.0f64..1.0), 0..40).prop_map(|rows| {
        let mut seen = HashSet::new();
        rows.into_iter()
            .filter(|(id, _, _)| seen.insert(*id))
            .map(|(id, source, score)| {
                ScoredChunk::new(Chunk::new(format!("k{id}"), source, "text"), score)
            })
            .collect()
    })
}

fn rank_of(scores: &ScoreMap, id: &ChunkId) -> usize {
    rank(scores).into_iter().find(|(candidate, _)| *candidate == id).map(|(_, r)| r).unwrap()
}

/// **Property: fused candidates are exactly the union of the inputs.**
mod prop_union {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn fused_ids_equal_union(dense in arb_scores(30), lexical in arb_scores(30)) {
            let fused = reciprocal_rank_fusion(&[&dense, &lexical], DEFAULT_RRF_K);
            let union: HashSet<&ChunkId> = dense.keys().chain(lexical.keys()).collect();
            let fused_ids: HashSet<&ChunkId> = fused.keys().collect();
            prop_assert_eq!(fused_ids, union);
            for score in fused.values() {
                prop_assert!(score.is_finite() && *score > 0.0);
            }
        }
    }
}

/// **Property: outranking in both lists never loses after fusion.**
mod prop_monotonic {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn dominant_ids_fuse_at_least_as_high(
            dense in arb_scores(30),
            lexical in arb_scores(30),
        ) {
            let fused = reciprocal_rank_fusion(&[&dense, &lexical], DEFAULT_RRF_K);
            let shared: Vec<&ChunkId> =
                dense.keys().filter(|id| lexical.contains_key(*id)).collect();
            for a in &shared {
                for b in &shared {
                    let a_wins_dense = rank_of(&dense, a) < rank_of(&dense, b);
                    let a_wins_lexical = rank_of(&lexical, a) < rank_of(&lexical, b);
                    if a_wins_dense && a_wins_lexical {
                        prop_assert!(fused[*a] >= fused[*b]);
                    }
                }
            }
        }

        #[test]
        fn single_list_fusion_preserves_order(dense in arb_scores(30), n in 0usize..40) {
            let fused = reciprocal_rank_fusion(&[&dense], DEFAULT_RRF_K);
            let top = top_n(&fused, n);
            prop_assert_eq!(top.len(), n.min(dense.len()));
            let expected: Vec<&ChunkId> =
                rank(&dense).into_iter().take(n).map(|(id, _)| id).collect();
            let actual: Vec<&ChunkId> = top.iter().map(|(id, _)| id).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}

/// **Property: deduplication keeps one best chunk per source and is idempotent.**
mod prop_dedup {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn dedup_is_idempotent(chunks in arb_scored_chunks()) {
            let once = deduplicate_by_source(chunks);
            let twice = deduplicate_by_source(once.clone());
            prop_assert_eq!(&once, &twice);
        }

        #[test]
        fn dedup_keeps_the_best_chunk_of_every_source(chunks in arb_scored_chunks()) {
            let mut best: HashMap<i64, f64> = HashMap::new();
            for chunk in &chunks {
                let entry = best.entry(chunk.source_id()).or_insert(f64::NEG_INFINITY);
                *entry = entry.max(chunk.score);
            }

            let kept = deduplicate_by_source(chunks);

            prop_assert_eq!(kept.len(), best.len());
            for chunk in &kept {
                prop_assert_eq!(chunk.score, best[&chunk.source_id()]);
            }
            for pair in kept.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}

/// **Property: boosts are bounded and halve every ninety days.**
mod prop_boosts {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn recency_is_bounded_and_halves_per_ninety_days(days in 0i64..3650) {
            let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
            let boost = recency_boost(now - Duration::days(days), now);
            let later = recency_boost(now - Duration::days(days + 90), now);
            prop_assert!(boost > 0.0 && boost <= 0.005);
            prop_assert!((later - boost / 2.0).abs() < 1e-12);
        }

        #[test]
        fn popularity_multiplier_is_finite(popularity in proptest::num::f64::ANY) {
            let multiplier = popularity_multiplier(popularity);
            prop_assert!(multiplier.is_finite());
            if popularity == 1.0 {
                prop_assert_eq!(multiplier, 1.0);
            }
        }
    }
}
