//! Synonym and abbreviation expansion.
//!
//! Expands queries with related terms to improve dense recall, e.g.
//! "ML algorithms" → "ML algorithms machine learning". The expanded text is
//! used for retrieval only; boosting works on the unexpanded query.

use std::sync::LazyLock;

use regex::Regex;

/// Term → synonyms. Abbreviations appear in both directions.
pub const SYNONYMS: &[(&str, &[&str])] = &[
    // AI / ML
    ("ml", &["machine learning"]),
    ("machine learning", &["ml"]),
    ("ai", &["artificial intelligence"]),
    ("artificial intelligence", &["ai"]),
    ("agi", &["artificial general intelligence"]),
    ("artificial general intelligence", &["agi"]),
    ("llm", &["large language model"]),
    ("llms", &["large language models"]),
    ("large language model", &["llm"]),
    ("large language models", &["llms"]),
    ("nlp", &["natural language processing"]),
    ("natural language processing", &["nlp"]),
    ("rl", &["reinforcement learning"]),
    ("reinforcement learning", &["rl"]),
    ("rlhf", &["reinforcement learning from human feedback"]),
    ("dl", &["deep learning"]),
    ("deep learning", &["dl", "neural networks"]),
    ("nn", &["neural network"]),
    ("neural network", &["nn", "deep learning"]),
    ("transformer", &["attention", "language model"]),
    ("interpretability", &["explainability", "mechanistic interpretability"]),
    ("alignment", &["ai safety", "value alignment"]),
    ("ai safety", &["alignment", "existential risk"]),
    // EA / rationality
    ("ea", &["effective altruism"]),
    ("effective altruism", &["ea"]),
    ("x-risk", &["existential risk"]),
    ("xrisk", &["existential risk"]),
    ("existential risk", &["x-risk"]),
    ("lw", &["lesswrong"]),
    ("bayesian", &["bayes", "probability"]),
    ("rationality", &["rationalist", "epistemics"]),
    ("longtermism", &["long-term future", "future generations"]),
    ("utilitarianism", &["consequentialism"]),
    // family
    ("mom", &["mother", "mum"]),
    ("mum", &["mother", "mom"]),
    ("mother", &["mom", "mum"]),
    ("dad", &["father"]),
    ("father", &["dad"]),
    ("grandma", &["grandmother"]),
    ("grandmother", &["grandma"]),
    ("grandpa", &["grandfather"]),
    ("grandfather", &["grandpa"]),
    ("sibling", &["brother", "sister"]),
    ("wife", &["spouse", "partner"]),
    ("husband", &["spouse", "partner"]),
    // general abbreviations
    ("db", &["database"]),
    ("database", &["db"]),
    ("pr", &["pull request"]),
    ("pull request", &["pr"]),
    ("k8s", &["kubernetes"]),
    ("kubernetes", &["k8s"]),
    ("js", &["javascript"]),
    ("javascript", &["js"]),
];

static SYNONYM_REGEXES: LazyLock<Vec<(Regex, &'static [&'static str])>> = LazyLock::new(|| {
    SYNONYMS
        .iter()
        .map(|(term, synonyms)| {
            let regex = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term)))
                .expect("unreachable error: invalid synonym term");
            (regex, *synonyms)
        })
        .collect()
});

/// Every synonym whose term occurs in `text` as a whole word, in table order.
pub fn synonyms_for(text: &str) -> Vec<&'static str> {
    SYNONYM_REGEXES
        .iter()
        .filter(|(regex, _)| regex.is_match(text))
        .flat_map(|(_, synonyms)| synonyms.iter().copied())
        .collect()
}

/// Append all synonyms of matched terms to the end of `text`.
pub fn expand(text: &str) -> String {
    let expansions = synonyms_for(text);
    if expansions.is_empty() {
        return text.to_string();
    }
    format!("{text} {}", expansions.join(" "))
}
