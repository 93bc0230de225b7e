//! Removal of conversational filler around the actual search topic.

use std::sync::LazyLock;

use regex::Regex;

use super::modality::collapse_whitespace;

/// `(pattern, replacement)` pairs, applied in order. Replacements may refer
/// to capture groups.
const META_PATTERNS: &[(&str, &str)] = &[
    (r"\bthere\s+(?:was|is)\s+(?:something|a\s+thing|this\s+thing|some\s+stuff)\s+(?:about|on|regarding)\b", ""),
    (r"\bi\s+(?:remember|recall)\s+(?:reading|seeing|hearing|writing)\s+(?:something\s+)?(?:about|on|that)?\b", ""),
    (r"\bi\s+(?:think|believe)\s+i\s+(?:read|saw|wrote)\s+(?:something\s+)?(?:about|on)?\b", ""),
    (r"\bthat\s+whole\s+(.+?)\s+thing\b", "$1"),
    (r"\bwhat\s+was\s+(?:that|the)\s+(?:article|post|thing)\s+(?:about|on)\b", ""),
    (r"^\s*(?:something|anything|stuff)\s+(?:about|on|regarding)\b", ""),
];

static META_REGEXES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    META_PATTERNS
        .iter()
        .map(|(pattern, replacement)| {
            let regex = Regex::new(&format!("(?i){pattern}"))
                .expect("unreachable error: invalid meta-language pattern");
            (regex, *replacement)
        })
        .collect()
});

/// Strip meta-language ("I remember reading about ...") and collapse
/// whitespace.
pub fn strip_meta_language(text: &str) -> String {
    let mut text = text.to_string();
    for (regex, replacement) in META_REGEXES.iter() {
        text = regex.replace_all(&text, *replacement).into_owned();
    }
    collapse_whitespace(&text)
}
