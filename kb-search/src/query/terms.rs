//! Meaningful query terms used for term-presence and title boosting.

use std::collections::HashSet;
use std::sync::LazyLock;

const STOP_WORDS_LIST: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "his", "how", "its", "may", "new", "now", "old", "see",
    "two", "way", "who", "did", "get", "got", "him", "let", "say", "she", "too", "use", "from",
    "that", "this", "with", "what", "when", "where", "which", "while", "will", "would", "could",
    "should", "there", "their", "them", "then", "they", "these", "those", "than", "been",
    "being", "were", "into", "about", "over", "some", "such", "only", "other", "also", "just",
    "like", "more", "most", "very", "your", "yours", "mine", "does", "doing", "done", "each",
    "here", "why", "something", "anything", "thing", "things", "stuff",
];

static STOP_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS_LIST.iter().copied().collect());

/// Whether `word` (lowercase) is a stop word.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// The distinct meaningful terms of a query, in first-seen order.
///
/// Terms are lowercase words longer than two characters that are not stop
/// words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTerms {
    terms: Vec<String>,
}

impl QueryTerms {
    /// Extract the meaningful terms of `text`.
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        let mut seen = HashSet::new();
        let terms = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !is_stop_word(w))
            .filter(|w| seen.insert(*w))
            .map(str::to_string)
            .collect();
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    /// Number of terms occurring as a substring of `haystack` (lowercased).
    pub fn count_matches(&self, haystack: &str) -> usize {
        let haystack = haystack.to_lowercase();
        self.iter().filter(|term| haystack.contains(term)).count()
    }

    /// Fraction of terms occurring in `haystack`, or 0.0 without terms.
    pub fn match_ratio(&self, haystack: &str) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.count_matches(haystack) as f64 / self.len() as f64
    }
}
