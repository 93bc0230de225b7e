//! Read-only access to the chunk and source records behind the indexes.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::document::{Chunk, ChunkId, SourceId, SourceMeta};
use crate::error::Result;

/// Batch lookup of chunk records.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Fetch the chunks with the given ids in one round trip.
    ///
    /// Ids with no matching record are omitted from the result; the order
    /// of the returned chunks is unspecified.
    async fn fetch_chunks(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>>;
}

/// Batch lookup of source metadata.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Fetch a snapshot of the given sources in one round trip.
    ///
    /// Unknown ids are omitted from the map.
    async fn fetch_sources(&self, ids: &[SourceId]) -> Result<HashMap<SourceId, SourceMeta>>;
}
