//! Query cleaning and enrichment ahead of retrieval.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::meta::strip_meta_language;
use super::modality::{collapse_whitespace, detect_modalities};
use super::synonyms;
use crate::config::ResolvedConfig;
use crate::deadline::Deadline;
use crate::document::{QueryPart, query_text};
use crate::hyde::HypotheticalDocumentGenerator;

/// The query after normalization, split by consumer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedQuery {
    /// Modalities to restrict retrieval to. Empty means all.
    pub modalities: BTreeSet<String>,
    /// Inputs for the dense retriever: cleaned text with expansions, every
    /// binary part, and the hypothetical document if one was generated.
    pub dense_inputs: Vec<QueryPart>,
    /// Inputs for the lexical retriever: cleaned, unexpanded.
    pub lexical_inputs: Vec<QueryPart>,
    /// Cleaned text used for term-presence and title boosting.
    pub term_text: String,
    /// The caller's text, untouched, used for reranking.
    pub raw_text: String,
    /// The generated hypothetical document, if any.
    pub hyde_document: Option<String>,
}

/// Cleans and enriches raw query parts.
///
/// Steps, in order: modality detection, meta-language stripping, synonym
/// expansion, hypothetical-document expansion. Detection, expansion and
/// HyDE are switched by the resolved config; stripping always runs.
pub struct QueryNormalizer {
    hyde: Option<Arc<dyn HypotheticalDocumentGenerator>>,
    hyde_timeout: Duration,
    min_hyde_tokens: usize,
}

impl Default for QueryNormalizer {
    fn default() -> Self {
        Self { hyde: None, hyde_timeout: Duration::from_secs(3), min_hyde_tokens: 4 }
    }
}

impl QueryNormalizer {
    /// A normalizer without a HyDE generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a hypothetical-document generator.
    pub fn with_hyde(
        mut self,
        generator: Arc<dyn HypotheticalDocumentGenerator>,
        timeout: Duration,
    ) -> Self {
        self.hyde = Some(generator);
        self.hyde_timeout = timeout;
        self
    }

    /// Only queries with at least `tokens` whitespace-separated tokens get HyDE.
    pub fn with_min_hyde_tokens(mut self, tokens: usize) -> Self {
        self.min_hyde_tokens = tokens;
        self
    }

    /// Run the synchronous steps: detection, stripping, expansion.
    pub fn clean(
        &self,
        inputs: &[QueryPart],
        modalities: &BTreeSet<String>,
        config: &ResolvedConfig,
    ) -> NormalizedQuery {
        let mut detected = BTreeSet::new();
        let mut dense_inputs = Vec::with_capacity(inputs.len() + 1);
        let mut lexical_inputs = Vec::with_capacity(inputs.len());
        let mut cleaned_texts = Vec::new();

        for part in inputs {
            let Some(text) = part.as_text() else {
                dense_inputs.push(part.clone());
                lexical_inputs.push(part.clone());
                continue;
            };

            let mut cleaned = text.to_string();
            if config.use_modality_detection {
                let detection = detect_modalities(&cleaned);
                detected.extend(detection.detected);
                cleaned = detection.text;
            }
            cleaned = strip_meta_language(&cleaned);
            if cleaned.is_empty() {
                // Nothing but filler: search with the original wording.
                cleaned = collapse_whitespace(text);
            }
            if cleaned.is_empty() {
                continue;
            }

            let dense_text = if config.use_query_expansion {
                synonyms::expand(&cleaned)
            } else {
                cleaned.clone()
            };
            dense_inputs.push(QueryPart::Text(dense_text));
            lexical_inputs.push(QueryPart::Text(cleaned.clone()));
            cleaned_texts.push(cleaned);
        }

        let modalities = if detected.is_empty() {
            modalities.clone()
        } else {
            debug!(?detected, "modality hints override requested modalities");
            detected
        };

        NormalizedQuery {
            modalities,
            dense_inputs,
            lexical_inputs,
            term_text: cleaned_texts.join(" "),
            raw_text: query_text(inputs),
            hyde_document: None,
        }
    }

    /// Run every step, including HyDE when enabled and the query is long
    /// enough.
    ///
    /// HyDE failures and timeouts are logged and otherwise ignored.
    pub async fn normalize(
        &self,
        inputs: &[QueryPart],
        modalities: &BTreeSet<String>,
        config: &ResolvedConfig,
        deadline: &Deadline,
    ) -> NormalizedQuery {
        let mut query = self.clean(inputs, modalities, config);
        if !config.use_hyde {
            return query;
        }
        let Some(generator) = &self.hyde else {
            debug!("hyde enabled but no generator configured");
            return query;
        };
        let tokens = query.term_text.split_whitespace().count();
        if tokens < self.min_hyde_tokens {
            debug!(tokens, min = self.min_hyde_tokens, "query too short for hyde");
            return query;
        }
        let Some(budget) = deadline.budget(self.hyde_timeout) else {
            warn!("deadline reached before hyde expansion, skipping");
            return query;
        };

        let generated =
            tokio::time::timeout(budget, generator.generate(&query.term_text, budget)).await;
        match generated {
            Ok(Ok(Some(document))) if !document.trim().is_empty() => {
                debug!(generator = generator.name(), chars = document.len(), "hyde document added");
                query.dense_inputs.push(QueryPart::Text(document.clone()));
                query.hyde_document = Some(document);
            }
            Ok(Ok(_)) => {
                debug!(generator = generator.name(), "hyde generator returned nothing");
            }
            Ok(Err(e)) => {
                warn!(
                    generator = generator.name(),
                    error = %e,
                    "hyde generation failed, continuing without it"
                );
            }
            Err(_) => {
                warn!(
                    generator = generator.name(),
                    ?budget,
                    "hyde generation timed out, continuing without it"
                );
            }
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureFlags, SearchConfig};

    fn resolved(flags: FeatureFlags) -> ResolvedConfig {
        SearchConfig::default().resolve(&flags)
    }

    fn all_on() -> ResolvedConfig {
        resolved(FeatureFlags {
            enable_bm25: true,
            enable_hyde: true,
            enable_reranking: true,
            enable_query_expansion: true,
            enable_modality_detection: true,
        })
    }

    #[test]
    fn detected_modality_overrides_caller_hints() {
        let normalizer = QueryNormalizer::new();
        let requested = BTreeSet::from(["mail".to_string()]);
        let query = normalizer.clean(
            &[QueryPart::text("something on lesswrong about rationality")],
            &requested,
            &all_on(),
        );
        assert_eq!(query.modalities, BTreeSet::from(["forum".to_string()]));
        assert_eq!(query.term_text, "rationality");
        assert_eq!(query.lexical_inputs, vec![QueryPart::text("rationality")]);
    }

    #[test]
    fn caller_hints_survive_when_nothing_detected() {
        let normalizer = QueryNormalizer::new();
        let requested = BTreeSet::from(["mail".to_string()]);
        let query = normalizer.clean(&[QueryPart::text("quarterly budget")], &requested, &all_on());
        assert_eq!(query.modalities, requested);
    }

    #[test]
    fn detection_disabled_keeps_text_and_hints() {
        let normalizer = QueryNormalizer::new();
        let mut config = all_on();
        config.use_modality_detection = false;
        let query = normalizer.clean(
            &[QueryPart::text("posts on lesswrong")],
            &BTreeSet::new(),
            &config,
        );
        assert!(query.modalities.is_empty());
        assert_eq!(query.term_text, "posts on lesswrong");
    }

    #[test]
    fn expansion_reaches_dense_inputs_only() {
        let normalizer = QueryNormalizer::new();
        let query =
            normalizer.clean(&[QueryPart::text("ML algorithms")], &BTreeSet::new(), &all_on());
        assert_eq!(query.dense_inputs, vec![QueryPart::text("ML algorithms machine learning")]);
        assert_eq!(query.lexical_inputs, vec![QueryPart::text("ML algorithms")]);
        assert_eq!(query.term_text, "ML algorithms");
    }

    #[test]
    fn binary_parts_are_forwarded_untouched() {
        let normalizer = QueryNormalizer::new();
        let image = QueryPart::Binary { mime_type: "image/jpeg".into(), data: vec![0xff, 0xd8] };
        let query = normalizer.clean(
            &[QueryPart::text("beach photos of"), image.clone()],
            &BTreeSet::new(),
            &all_on(),
        );
        assert!(query.dense_inputs.contains(&image));
        assert_eq!(query.raw_text, "beach photos of");
    }

    #[test]
    fn pure_filler_falls_back_to_original_text() {
        let normalizer = QueryNormalizer::new();
        let query =
            normalizer.clean(&[QueryPart::text("something about")], &BTreeSet::new(), &all_on());
        assert_eq!(query.term_text, "something about");
    }
}
