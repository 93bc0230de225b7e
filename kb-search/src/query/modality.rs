//! Modality hints embedded in query text.
//!
//! "something on lesswrong about rationality" asks for forum posts; the
//! phrase "on lesswrong" is a filter, not a search term, so it is removed
//! from the text once the hint is recorded.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// A detection rule: when `pattern` matches, add `modalities`, and remove
/// the matched span from the query if `strip` is set.
#[derive(Debug, Clone, Copy)]
pub struct ModalityRule {
    pub pattern: &'static str,
    pub modalities: &'static [&'static str],
    pub strip: bool,
}

const fn rule(
    pattern: &'static str,
    modalities: &'static [&'static str],
    strip: bool,
) -> ModalityRule {
    ModalityRule { pattern, modalities, strip }
}

/// Detection rules, applied in order.
///
/// Prepositional phrases ("in my email") are stripped; bare nouns
/// ("pdf", "blog post") only contribute the hint.
pub const MODALITY_RULES: &[ModalityRule] = &[
    // comics
    rule(r"\b(?:on|in|from)\s+(?:an?\s+|the\s+|some\s+)?(?:web)?comics?\b", &["comic"], true),
    rule(r"\b(?:web)?comics?\b|\bxkcd\b|\bsmbc\b", &["comic"], false),
    // forums, by site name
    rule(r"\b(?:on|in|from)\s+(?:the\s+)?(?:lesswrong|less\s+wrong|lw)\b", &["forum"], true),
    rule(
        r"\b(?:on|in|from)\s+(?:the\s+)?(?:ea|effective\s+altruism|alignment)\s+forum\b",
        &["forum"],
        true,
    ),
    rule(r"\b(?:on|in|from)\s+(?:reddit|hacker\s*news|hn)\b", &["forum"], true),
    rule(r"\b(?:forum|lesswrong)\s+posts?\b", &["forum"], true),
    // books
    rule(r"\b(?:in|from)\s+(?:an?\s+|the\s+|some\s+|my\s+)book\b", &["book"], true),
    rule(r"\b(?:books?|novels?|ebooks?)\b", &["book"], false),
    // blogs and articles
    rule(
        r"\b(?:in|on|from)\s+(?:an?\s+|the\s+|some\s+)(?:blog(?:\s+post)?|article|essay)\b",
        &["blog"],
        true,
    ),
    rule(r"\b(?:blog\s*posts?|blogs?|articles?|essays?)\b", &["blog"], false),
    // email
    rule(r"\b(?:in|from)\s+(?:an?\s+|my\s+|the\s+|some\s+)?e-?mails?\b", &["mail"], true),
    rule(r"\b(?:e-?mails?|inbox)\b", &["mail"], false),
    // photos and images
    rule(
        r"\b(?:in|from)\s+(?:an?\s+|the\s+|my\s+|some\s+)(?:photo|picture|image|screenshot)s?\b",
        &["photo"],
        true,
    ),
    rule(r"\b(?:photos?|pictures?|images?|screenshots?)\s+of\b", &["photo"], true),
    // documents
    rule(
        r"\b(?:in|from)\s+(?:an?\s+|the\s+|my\s+|some\s+)(?:document|doc|pdf|paper)s?\b",
        &["doc"],
        true,
    ),
    rule(r"\bpdfs?\b", &["doc"], false),
    // chat
    rule(r"\b(?:on|in|from)\s+(?:the\s+)?(?:discord|slack)\b", &["chat"], true),
    rule(
        r"\b(?:in|from)\s+(?:an?\s+|the\s+|my\s+|some\s+)(?:chat|conversation|dm)s?\b",
        &["chat"],
        true,
    ),
    // git
    rule(
        r"\b(?:in|from)\s+(?:an?\s+|the\s+|some\s+)(?:git\s+)?(?:commit|pull\s+request|pr)s?\b",
        &["git"],
        true,
    ),
    rule(r"\b(?:git|commit\s+messages?|pull\s+requests?)\b", &["git"], false),
];

struct CompiledRule {
    regex: Regex,
    modalities: &'static [&'static str],
    strip: bool,
}

static COMPILED_RULES: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    MODALITY_RULES
        .iter()
        .map(|rule| CompiledRule {
            regex: Regex::new(&format!("(?i){}", rule.pattern))
                .expect("unreachable error: invalid modality pattern"),
            modalities: rule.modalities,
            strip: rule.strip,
        })
        .collect()
});

/// Outcome of scanning a query for modality hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalityDetection {
    /// The query with stripped spans removed and whitespace collapsed.
    pub text: String,
    /// Every modality hinted at. Empty if nothing matched.
    pub detected: BTreeSet<String>,
}

/// Scan `text` against [`MODALITY_RULES`].
///
/// Each rule is applied once, to its first match in the text as left by the
/// previous rules.
pub fn detect_modalities(text: &str) -> ModalityDetection {
    let mut text = text.to_string();
    let mut detected = BTreeSet::new();

    for rule in COMPILED_RULES.iter() {
        let Some(found) = rule.regex.find(&text) else {
            continue;
        };
        detected.extend(rule.modalities.iter().map(|m| (*m).to_string()));
        if rule.strip {
            let range = found.range();
            text.replace_range(range, " ");
        }
    }

    ModalityDetection { text: collapse_whitespace(&text), detected }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_rules_compile() {
        assert_eq!(COMPILED_RULES.len(), MODALITY_RULES.len());
    }

    #[test]
    fn site_name_maps_to_forum_and_is_stripped() {
        let result = detect_modalities("something on LessWrong about rationality");
        assert_eq!(result.detected, BTreeSet::from(["forum".to_string()]));
        assert_eq!(result.text, "something about rationality");
    }

    #[test]
    fn bare_nouns_hint_without_stripping() {
        let result = detect_modalities("that pdf on tax brackets");
        assert_eq!(result.detected, BTreeSet::from(["doc".to_string()]));
        assert_eq!(result.text, "that pdf on tax brackets");
    }

    #[test]
    fn multiple_rules_accumulate() {
        let result = detect_modalities("the xkcd comic I got in an email from Bob");
        assert!(result.detected.contains("comic"));
        assert!(result.detected.contains("mail"));
        assert_eq!(result.text, "the xkcd comic I got from Bob");
    }

    #[test]
    fn plain_queries_detect_nothing() {
        let result = detect_modalities("gradient descent convergence");
        assert!(result.detected.is_empty());
        assert_eq!(result.text, "gradient descent convergence");
    }
}
