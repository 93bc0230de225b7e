//! Hypothetical Document Embeddings (HyDE).
//!
//! A generator writes a short document that would answer the query; the
//! document is then used as an extra dense-retrieval input. Answers tend to
//! sit closer to relevant chunks in embedding space than questions do.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Generates a hypothetical answer document for a query.
///
/// Usually backed by an LLM call. Returning `Ok(None)` means "nothing
/// useful to add" and is not an error.
#[async_trait]
pub trait HypotheticalDocumentGenerator: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate a hypothetical document for `query` within `timeout`.
    async fn generate(&self, query: &str, timeout: Duration) -> Result<Option<String>>;
}

/// An in-process generator that wraps the query in a fixed answer template.
///
/// Useful when no LLM is available: the template shifts the query toward
/// the declarative register that stored documents are written in.
///
/// # Example
///
/// ```rust,ignore
/// use kb_search::TemplateHydeGenerator;
///
/// let generator = TemplateHydeGenerator::default();
/// let doc = generator.generate("why do cats purr", timeout).await?;
/// ```
#[derive(Debug, Clone)]
pub struct TemplateHydeGenerator {
    prefix: String,
}

impl Default for TemplateHydeGenerator {
    fn default() -> Self {
        Self { prefix: "Notes on".to_string() }
    }
}

impl TemplateHydeGenerator {
    /// Create a generator with a custom lead-in phrase.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

#[async_trait]
impl HypotheticalDocumentGenerator for TemplateHydeGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, query: &str, _timeout: Duration) -> Result<Option<String>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "{} {query}. This passage discusses {query} in detail, covering the key ideas, \
             arguments, and examples related to it.",
            self.prefix
        )))
    }
}
