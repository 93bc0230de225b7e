//! Data types for query inputs, chunks, sources, and search results.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque chunk identifier, as assigned by the indexing layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub String);

impl ChunkId {
    /// Create a chunk id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChunkId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ChunkId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of the source (email, post, book, ...) a chunk belongs to.
pub type SourceId = i64;

/// One part of a query. A query is an ordered sequence of parts.
///
/// Only [`QueryPart::Text`] parts take part in text normalization; every
/// part is forwarded to the dense retriever, which may be multimodal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryPart {
    /// A natural-language text fragment.
    Text(String),
    /// A binary payload attached by the caller (image, file, ...).
    Binary {
        /// MIME type of the payload.
        mime_type: String,
        /// Raw bytes.
        data: Vec<u8>,
    },
}

impl QueryPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        QueryPart::Text(text.into())
    }

    /// The text of this part, if it is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            QueryPart::Text(text) => Some(text),
            QueryPart::Binary { .. } => None,
        }
    }
}

/// Join all text parts of a query with single spaces.
pub fn query_text(parts: &[QueryPart]) -> String {
    parts
        .iter()
        .filter_map(QueryPart::as_text)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A chunk record as returned by the chunk store.
///
/// Only the light fields are fetched; the heavier columns stay in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: ChunkId,
    /// The source this chunk belongs to.
    pub source_id: SourceId,
    /// Text content, absent for non-text chunks (e.g. images).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Paths of files backing this chunk, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_paths: Option<Vec<String>>,
}

impl Chunk {
    /// Create a text chunk.
    pub fn new(id: impl Into<ChunkId>, source_id: SourceId, content: impl Into<String>) -> Self {
        Self { id: id.into(), source_id, content: Some(content.into()), file_paths: None }
    }
}

/// A [`Chunk`] paired with its relevance score for the current query.
///
/// The score is rewritten by each pipeline stage and never outlives the
/// query that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The chunk record.
    pub chunk: Chunk,
    /// Relevance score (higher is more relevant).
    pub score: f64,
}

impl ScoredChunk {
    /// Pair a chunk with a score.
    pub fn new(chunk: Chunk, score: f64) -> Self {
        Self { chunk, score }
    }

    /// Shortcut for `self.chunk.source_id`.
    pub fn source_id(&self) -> SourceId {
        self.chunk.source_id
    }
}

/// Sort chunks by descending score, NaN last. The sort is stable.
pub(crate) fn sort_by_score(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| descending(a.score, b.score));
}

/// Descending score order with NaN ranked below every number.
pub(crate) fn descending(a: f64, b: f64) -> Ordering {
    let key = |score: f64| if score.is_nan() { f64::NEG_INFINITY } else { score };
    key(b).total_cmp(&key(a))
}

/// Insertion timestamp of a source.
///
/// Some stores keep timezone-less timestamps; those are read as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceTimestamp {
    /// Timezone-aware timestamp.
    Utc(DateTime<Utc>),
    /// Naive timestamp, interpreted as UTC.
    Naive(NaiveDateTime),
}

impl SourceTimestamp {
    /// The timestamp in UTC.
    pub fn to_utc(self) -> DateTime<Utc> {
        match self {
            SourceTimestamp::Utc(ts) => ts,
            SourceTimestamp::Naive(ts) => ts.and_utc(),
        }
    }
}

impl From<DateTime<Utc>> for SourceTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        SourceTimestamp::Utc(value)
    }
}

impl From<NaiveDateTime> for SourceTimestamp {
    fn from(value: NaiveDateTime) -> Self {
        SourceTimestamp::Naive(value)
    }
}

fn default_popularity() -> f64 {
    1.0
}

/// Read-only snapshot of a source's descriptive fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    /// Source identifier.
    pub id: SourceId,
    /// Title, if the source has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Popularity karma; 1.0 is neutral.
    #[serde(default = "default_popularity")]
    pub popularity: f64,
    /// When the source was inserted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted_at: Option<SourceTimestamp>,
}

impl SourceMeta {
    /// A source with no title, neutral popularity, and unknown insertion time.
    pub fn new(id: SourceId) -> Self {
        Self { id, title: None, popularity: default_popularity(), inserted_at: None }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the popularity.
    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = popularity;
        self
    }

    /// Set the insertion timestamp.
    pub fn with_inserted_at(mut self, inserted_at: impl Into<SourceTimestamp>) -> Self {
        self.inserted_at = Some(inserted_at.into());
        self
    }
}

/// Opaque filter criteria forwarded verbatim to both retrievers.
///
/// This crate never inspects the contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchFilters(pub HashMap<String, serde_json::Value>);

impl SearchFilters {
    /// Empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Whether any criteria are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A chunk as exposed in a [`SearchResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultChunk {
    /// Chunk identifier.
    pub id: ChunkId,
    /// Final relevance score of the chunk.
    pub score: f64,
    /// Content preview, present only when previews were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Paths of backing files, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_paths: Option<Vec<String>>,
}

/// One search hit per distinct source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The source this result describes.
    pub source_id: SourceId,
    /// Source title, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Source insertion time, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted_at: Option<DateTime<Utc>>,
    /// Score used for final ordering.
    pub search_score: f64,
    /// The surviving chunks of this source, best first.
    pub chunks: Vec<ResultChunk>,
}
