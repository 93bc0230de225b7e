//! Configuration for the search pipeline.
//!
//! There are three layers:
//!
//! - [`FeatureFlags`]: process-wide defaults for the optional stages.
//! - [`SearchConfig`]: per-query settings. Unset `use_*` fields fall back to
//!   the flags; explicit values always win.
//! - [`PipelineSettings`]: tuning knobs fixed when the pipeline is built.
//!
//! [`SearchConfig::resolve`] folds the first two into an immutable
//! [`ResolvedConfig`] once at pipeline entry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Upper bound on `SearchConfig::limit`.
pub const MAX_LIMIT: usize = 200;

/// Process-wide switches for the optional pipeline stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureFlags {
    /// Run lexical (BM25) retrieval alongside dense retrieval.
    pub enable_bm25: bool,
    /// Expand long queries with a hypothetical document.
    pub enable_hyde: bool,
    /// Rerank the candidate window with a cross-encoder.
    pub enable_reranking: bool,
    /// Append synonyms and abbreviation expansions to the dense query.
    pub enable_query_expansion: bool,
    /// Detect modality hints ("on lesswrong", "in my email") in the query.
    pub enable_modality_detection: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_bm25: true,
            enable_hyde: false,
            enable_reranking: false,
            enable_query_expansion: true,
            enable_modality_detection: true,
        }
    }
}

impl FeatureFlags {
    /// Read flags from `KB_SEARCH_ENABLE_*` environment variables.
    ///
    /// Variables that are unset or unparseable keep their default value.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read flags through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key).as_deref().and_then(parse_bool).unwrap_or(default)
        };
        Self {
            enable_bm25: flag("KB_SEARCH_ENABLE_BM25", defaults.enable_bm25),
            enable_hyde: flag("KB_SEARCH_ENABLE_HYDE", defaults.enable_hyde),
            enable_reranking: flag("KB_SEARCH_ENABLE_RERANKING", defaults.enable_reranking),
            enable_query_expansion: flag(
                "KB_SEARCH_ENABLE_QUERY_EXPANSION",
                defaults.enable_query_expansion,
            ),
            enable_modality_detection: flag(
                "KB_SEARCH_ENABLE_MODALITY_DETECTION",
                defaults.enable_modality_detection,
            ),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// An explicit config value overrides the global flag.
pub fn resolve(config_value: Option<bool>, global_flag: bool) -> bool {
    config_value.unwrap_or(global_flag)
}

/// Per-query search settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Maximum number of source results to return.
    pub limit: usize,
    /// Overall time budget for the query, in seconds.
    pub timeout_secs: u64,
    /// Include chunk content previews in the results.
    pub previews: bool,
    /// Override for [`FeatureFlags::enable_bm25`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_bm25: Option<bool>,
    /// Override for [`FeatureFlags::enable_hyde`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_hyde: Option<bool>,
    /// Override for [`FeatureFlags::enable_reranking`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_reranking: Option<bool>,
    /// Override for [`FeatureFlags::enable_query_expansion`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_query_expansion: Option<bool>,
    /// Override for [`FeatureFlags::enable_modality_detection`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_modality_detection: Option<bool>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            timeout_secs: 20,
            previews: false,
            use_bm25: None,
            use_hyde: None,
            use_reranking: None,
            use_query_expansion: None,
            use_modality_detection: None,
        }
    }
}

impl SearchConfig {
    /// Create a new builder for constructing a [`SearchConfig`].
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }

    /// The overall time budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the optional switches against the global flags.
    pub fn resolve(&self, flags: &FeatureFlags) -> ResolvedConfig {
        ResolvedConfig {
            limit: self.limit,
            timeout: self.timeout(),
            previews: self.previews,
            use_bm25: resolve(self.use_bm25, flags.enable_bm25),
            use_hyde: resolve(self.use_hyde, flags.enable_hyde),
            use_reranking: resolve(self.use_reranking, flags.enable_reranking),
            use_query_expansion: resolve(self.use_query_expansion, flags.enable_query_expansion),
            use_modality_detection: resolve(
                self.use_modality_detection,
                flags.enable_modality_detection,
            ),
        }
    }

    /// Check the invariants enforced by [`SearchConfigBuilder::build`].
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ConfigError`] if:
    /// - `limit == 0` or `limit > MAX_LIMIT`
    /// - `timeout_secs == 0`
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(SearchError::ConfigError("limit must be greater than zero".to_string()));
        }
        if self.limit > MAX_LIMIT {
            return Err(SearchError::ConfigError(format!(
                "limit ({}) must not exceed {MAX_LIMIT}",
                self.limit
            )));
        }
        if self.timeout_secs == 0 {
            return Err(SearchError::ConfigError(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`SearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Set the maximum number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = limit;
        self
    }

    /// Set the overall time budget in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// Include content previews in results.
    pub fn previews(mut self, previews: bool) -> Self {
        self.config.previews = previews;
        self
    }

    /// Force lexical retrieval on or off for this query.
    pub fn use_bm25(mut self, enabled: bool) -> Self {
        self.config.use_bm25 = Some(enabled);
        self
    }

    /// Force HyDE expansion on or off for this query.
    pub fn use_hyde(mut self, enabled: bool) -> Self {
        self.config.use_hyde = Some(enabled);
        self
    }

    /// Force reranking on or off for this query.
    pub fn use_reranking(mut self, enabled: bool) -> Self {
        self.config.use_reranking = Some(enabled);
        self
    }

    /// Force synonym expansion on or off for this query.
    pub fn use_query_expansion(mut self, enabled: bool) -> Self {
        self.config.use_query_expansion = Some(enabled);
        self
    }

    /// Force modality detection on or off for this query.
    pub fn use_modality_detection(mut self, enabled: bool) -> Self {
        self.config.use_modality_detection = Some(enabled);
        self
    }

    /// Build the [`SearchConfig`], validating its parameters.
    ///
    /// # Errors
    ///
    /// See [`SearchConfig::validate`].
    pub fn build(self) -> Result<SearchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Per-query configuration with every switch resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub limit: usize,
    pub timeout: Duration,
    pub previews: bool,
    pub use_bm25: bool,
    pub use_hyde: bool,
    pub use_reranking: bool,
    pub use_query_expansion: bool,
    pub use_modality_detection: bool,
}

/// Tuning knobs fixed for the lifetime of a [`SearchPipeline`](crate::SearchPipeline).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Retrieval depth is `limit × candidate_multiplier` for both retrievers.
    pub candidate_multiplier: usize,
    /// With reranking on, `limit × rerank_window_multiplier` chunks are materialized.
    pub rerank_window_multiplier: usize,
    /// RRF damping constant.
    pub rrf_k: u32,
    /// HyDE runs only for queries with at least this many tokens.
    pub min_hyde_tokens: usize,
    pub hyde_timeout_secs: u64,
    /// Lexical retrieval gets at most this long, and never more than half of
    /// the time left in the query.
    pub lexical_timeout_secs: u64,
    pub rerank_timeout_secs: u64,
    /// Budget for each chunk/source store round trip.
    pub store_timeout_secs: u64,
    /// Model name handed to the reranker.
    pub rerank_model: String,
    /// Keep only the best chunk per source before reranking.
    pub deduplicate: bool,
    /// Process-wide defaults for the optional stages.
    pub flags: FeatureFlags,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            candidate_multiplier: 5,
            rerank_window_multiplier: 3,
            rrf_k: crate::fusion::DEFAULT_RRF_K,
            min_hyde_tokens: 4,
            hyde_timeout_secs: 3,
            lexical_timeout_secs: 5,
            rerank_timeout_secs: 10,
            store_timeout_secs: 10,
            rerank_model: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
            deduplicate: true,
            flags: FeatureFlags::default(),
        }
    }
}

impl PipelineSettings {
    /// Create a new builder for constructing [`PipelineSettings`].
    pub fn builder() -> PipelineSettingsBuilder {
        PipelineSettingsBuilder::default()
    }

    pub fn hyde_timeout(&self) -> Duration {
        Duration::from_secs(self.hyde_timeout_secs)
    }

    pub fn lexical_timeout(&self) -> Duration {
        Duration::from_secs(self.lexical_timeout_secs)
    }

    pub fn rerank_timeout(&self) -> Duration {
        Duration::from_secs(self.rerank_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Check the settings, however they were constructed.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ConfigError`] if either multiplier is zero or
    /// any stage timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.candidate_multiplier == 0 || self.rerank_window_multiplier == 0 {
            return Err(SearchError::ConfigError(
                "candidate and rerank window multipliers must be greater than zero".to_string(),
            ));
        }
        let timeouts = [
            self.hyde_timeout_secs,
            self.lexical_timeout_secs,
            self.rerank_timeout_secs,
            self.store_timeout_secs,
        ];
        if timeouts.contains(&0) {
            return Err(SearchError::ConfigError(
                "stage timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing validated [`PipelineSettings`].
#[derive(Debug, Clone, Default)]
pub struct PipelineSettingsBuilder {
    settings: PipelineSettings,
}

impl PipelineSettingsBuilder {
    pub fn candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.settings.candidate_multiplier = multiplier;
        self
    }

    pub fn rerank_window_multiplier(mut self, multiplier: usize) -> Self {
        self.settings.rerank_window_multiplier = multiplier;
        self
    }

    pub fn rrf_k(mut self, k: u32) -> Self {
        self.settings.rrf_k = k;
        self
    }

    pub fn min_hyde_tokens(mut self, tokens: usize) -> Self {
        self.settings.min_hyde_tokens = tokens;
        self
    }

    pub fn hyde_timeout_secs(mut self, secs: u64) -> Self {
        self.settings.hyde_timeout_secs = secs;
        self
    }

    pub fn lexical_timeout_secs(mut self, secs: u64) -> Self {
        self.settings.lexical_timeout_secs = secs;
        self
    }

    pub fn rerank_timeout_secs(mut self, secs: u64) -> Self {
        self.settings.rerank_timeout_secs = secs;
        self
    }

    pub fn store_timeout_secs(mut self, secs: u64) -> Self {
        self.settings.store_timeout_secs = secs;
        self
    }

    pub fn rerank_model(mut self, model: impl Into<String>) -> Self {
        self.settings.rerank_model = model.into();
        self
    }

    pub fn deduplicate(mut self, deduplicate: bool) -> Self {
        self.settings.deduplicate = deduplicate;
        self
    }

    pub fn flags(mut self, flags: FeatureFlags) -> Self {
        self.settings.flags = flags;
        self
    }

    /// Build the [`PipelineSettings`].
    ///
    /// # Errors
    ///
    /// See [`PipelineSettings::validate`].
    pub fn build(self) -> Result<PipelineSettings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_overrides_flags() {
        assert!(resolve(Some(true), false));
        assert!(!resolve(Some(false), true));
        assert!(resolve(None, true));
        assert!(!resolve(None, false));
    }

    #[test]
    fn resolve_falls_back_per_field() {
        let flags = FeatureFlags {
            enable_bm25: false,
            enable_hyde: true,
            enable_reranking: true,
            enable_query_expansion: false,
            enable_modality_detection: true,
        };
        let config = SearchConfig::builder().use_bm25(true).use_reranking(false).build().unwrap();
        let resolved = config.resolve(&flags);
        assert!(resolved.use_bm25);
        assert!(resolved.use_hyde);
        assert!(!resolved.use_reranking);
        assert!(!resolved.use_query_expansion);
        assert!(resolved.use_modality_detection);
    }

    #[test]
    fn builder_rejects_zero_limit_and_timeout() {
        assert!(SearchConfig::builder().limit(0).build().is_err());
        assert!(SearchConfig::builder().timeout_secs(0).build().is_err());
        assert!(SearchConfig::builder().limit(MAX_LIMIT + 1).build().is_err());
        assert!(SearchConfig::builder().limit(MAX_LIMIT).build().is_ok());
    }

    #[test]
    fn flags_from_lookup_parse_common_spellings() {
        let flags = FeatureFlags::from_lookup(|key| match key {
            "KB_SEARCH_ENABLE_BM25" => Some("off".to_string()),
            "KB_SEARCH_ENABLE_HYDE" => Some("YES".to_string()),
            "KB_SEARCH_ENABLE_RERANKING" => Some("maybe".to_string()),
            _ => None,
        });
        assert!(!flags.enable_bm25);
        assert!(flags.enable_hyde);
        assert_eq!(flags.enable_reranking, FeatureFlags::default().enable_reranking);
    }

    #[test]
    fn settings_builder_validates_multipliers() {
        assert!(PipelineSettings::builder().candidate_multiplier(0).build().is_err());
        assert!(PipelineSettings::builder().store_timeout_secs(0).build().is_err());
        let settings = PipelineSettings::builder().rrf_k(30).build().unwrap();
        assert_eq!(settings.rrf_k, 30);
        assert_eq!(settings.candidate_multiplier, 5);
    }

    #[test]
    fn search_config_deserializes_with_unset_switches() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"limit": 5, "timeout_secs": 2, "previews": true}"#).unwrap();
        assert_eq!(config.use_bm25, None);
        assert_eq!(config.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn huge_timeouts_are_valid() {
        let config: SearchConfig =
            serde_json::from_str(&format!(r#"{{"limit": 5, "timeout_secs": {}}}"#, u64::MAX))
                .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolve(&FeatureFlags::default()).timeout.as_secs(), u64::MAX);
    }

    #[test]
    fn deserialized_settings_are_validated() {
        let settings: PipelineSettings =
            serde_json::from_str(r#"{"candidate_multiplier": 0}"#).unwrap();
        assert!(settings.validate().is_err());

        let settings: PipelineSettings =
            serde_json::from_str(r#"{"lexical_timeout_secs": 0}"#).unwrap();
        assert!(settings.validate().is_err());

        assert!(PipelineSettings::default().validate().is_ok());
        assert_eq!(PipelineSettings::default().lexical_timeout(), Duration::from_secs(5));
    }
}
