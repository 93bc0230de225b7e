//! Score adjustments applied to fused chunks.
//!
//! Order matters: term presence, then title match, then the popularity
//! multiplier over the running score, then recency last.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::document::{ScoredChunk, SourceId, SourceMeta};
use crate::query::QueryTerms;

/// Maximum additive boost for query terms present in chunk content.
pub const TERM_BOOST: f64 = 0.005;
/// Maximum additive boost for query terms present in the source title.
pub const TITLE_BOOST: f64 = 0.01;
/// Multiplier slope per unit of popularity away from neutral.
pub const POPULARITY_SCALE: f64 = 0.02;
/// Additive boost for a source inserted just now.
pub const RECENCY_BOOST: f64 = 0.005;
/// Days after which the recency boost halves.
pub const RECENCY_HALF_LIFE_DAYS: f64 = 90.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Add `TERM_BOOST × matched/total` to each chunk whose content holds query
/// terms. No-op without terms.
pub fn apply_term_boost(chunks: &mut [ScoredChunk], terms: &QueryTerms) {
    if terms.is_empty() {
        return;
    }
    for scored in chunks.iter_mut() {
        if let Some(content) = scored.chunk.content.as_deref() {
            scored.score += TERM_BOOST * terms.match_ratio(content);
        }
    }
}

/// Multiplier for a source's popularity. Non-finite values are neutral.
pub fn popularity_multiplier(popularity: f64) -> f64 {
    if !popularity.is_finite() {
        return 1.0;
    }
    1.0 + POPULARITY_SCALE * (popularity - 1.0)
}

/// Recency boost for a source inserted at `inserted_at`, seen from `now`.
///
/// Timestamps in the future count as age zero.
pub fn recency_boost(inserted_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - inserted_at).num_seconds().max(0) as f64 / SECONDS_PER_DAY;
    RECENCY_BOOST * 0.5_f64.powf(age_days / RECENCY_HALF_LIFE_DAYS)
}

/// Apply title, popularity and recency boosts from source metadata.
///
/// Chunks whose source is missing from `sources` are left unchanged.
pub fn apply_source_boosts(
    chunks: &mut [ScoredChunk],
    terms: &QueryTerms,
    sources: &HashMap<SourceId, SourceMeta>,
    now: DateTime<Utc>,
) {
    for scored in chunks.iter_mut() {
        let Some(source) = sources.get(&scored.source_id()) else {
            continue;
        };

        if !terms.is_empty() {
            if let Some(title) = source.title.as_deref().filter(|t| !t.trim().is_empty()) {
                scored.score += TITLE_BOOST * terms.match_ratio(title);
            }
        }

        if source.popularity != 1.0 {
            scored.score *= popularity_multiplier(source.popularity);
        }

        if let Some(inserted_at) = &source.inserted_at {
            scored.score += recency_boost(inserted_at.to_utc(), now);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::document::Chunk;

    fn chunk(id: &str, source_id: SourceId, content: &str, score: f64) -> ScoredChunk {
        ScoredChunk::new(Chunk::new(id, source_id, content), score)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn recency_halves_every_ninety_days() {
        let now = Utc::now();
        assert!(close(recency_boost(now, now), 0.005));
        assert!(close(recency_boost(now - Duration::days(90), now), 0.0025));
        assert!(close(recency_boost(now - Duration::days(180), now), 0.00125));
    }

    #[test]
    fn future_timestamps_get_full_recency() {
        let now = Utc::now();
        assert!(close(recency_boost(now + Duration::days(3), now), 0.005));
    }

    #[test]
    fn neutral_popularity_leaves_score_alone() {
        assert_eq!(popularity_multiplier(1.0), 1.0);
        assert_eq!(popularity_multiplier(f64::NAN), 1.0);
        assert!(close(popularity_multiplier(2.0), 1.02));
        assert!(close(popularity_multiplier(0.5), 0.99));
    }

    #[test]
    fn term_boost_scales_with_matched_fraction() {
        let terms = QueryTerms::from_text("machine learning ethics");
        let mut chunks = vec![
            chunk("a", 1, "Machine learning and ethics", 0.1),
            chunk("b", 2, "machine shop", 0.1),
            chunk("c", 3, "gardening", 0.1),
        ];
        apply_term_boost(&mut chunks, &terms);
        assert!(close(chunks[0].score, 0.105));
        assert!(close(chunks[1].score, 0.1 + 0.005 / 3.0));
        assert!(close(chunks[2].score, 0.1));
    }

    #[test]
    fn term_boost_skips_without_terms() {
        let mut chunks = vec![chunk("a", 1, "the and of", 0.1)];
        apply_term_boost(&mut chunks, &QueryTerms::from_text("the and of"));
        assert_eq!(chunks[0].score, 0.1);
    }

    #[test]
    fn source_boosts_apply_in_order() {
        let now = Utc::now();
        let terms = QueryTerms::from_text("rationality");
        let sources = HashMap::from([(
            1,
            SourceMeta::new(1)
                .with_title("On Rationality")
                .with_popularity(2.0)
                .with_inserted_at(now),
        )]);
        let mut chunks = vec![chunk("a", 1, "text", 0.1)];
        apply_source_boosts(&mut chunks, &terms, &sources, now);
        // (0.1 + 0.01) * 1.02 + 0.005
        assert!(close(chunks[0].score, 0.11 * 1.02 + 0.005));
    }

    #[test]
    fn recency_applies_without_query_terms() {
        let now = Utc::now();
        let sources =
            HashMap::from([(1, SourceMeta::new(1).with_title("x").with_inserted_at(now))]);
        let mut chunks = vec![chunk("a", 1, "text", 0.1)];
        apply_source_boosts(&mut chunks, &QueryTerms::default(), &sources, now);
        assert!(close(chunks[0].score, 0.105));
    }

    #[test]
    fn unknown_sources_are_untouched() {
        let mut chunks = vec![chunk("a", 7, "text", 0.1)];
        apply_source_boosts(&mut chunks, &QueryTerms::default(), &HashMap::new(), Utc::now());
        assert_eq!(chunks[0].score, 0.1);
    }
}
