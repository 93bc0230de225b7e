//! Error types for the `kb-search` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while executing a search.
///
/// Only some of these ever reach the caller of
/// [`SearchPipeline::search`](crate::SearchPipeline::search). Failures of
/// optional stages (lexical retrieval, HyDE, reranking, source metadata) are
/// logged and absorbed by the pipeline.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A retriever (dense or lexical) failed to produce candidates.
    #[error("Retrieval error ({retriever}): {message}")]
    Retrieval {
        /// The retriever that produced the error.
        retriever: String,
        /// A description of the failure.
        message: String,
    },

    /// A pipeline stage did not finish within its time budget.
    #[error("Timeout in stage '{stage}' after {after:?}")]
    Timeout {
        /// The stage that timed out.
        stage: &'static str,
        /// The budget that was exhausted.
        after: Duration,
    },

    /// An error occurred in the chunk or source store.
    #[error("Store error ({store}): {message}")]
    Store {
        /// The store backend that produced the error.
        store: String,
        /// A description of the failure.
        message: String,
    },

    /// The hypothetical-document generator failed.
    #[error("Generation error ({generator}): {message}")]
    Generation {
        /// The generator that produced the error.
        generator: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during cross-encoder reranking.
    #[error("Reranker error ({reranker}): {message}")]
    Reranker {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// Building the source-level result failed.
    #[error("Result build error for source {source_id}: {message}")]
    ResultBuild {
        /// The source whose result could not be built.
        source_id: i64,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the search pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl SearchError {
    /// Whether this error is a timeout signal.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SearchError::Timeout { .. })
    }
}

/// A convenience result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
