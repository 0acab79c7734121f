//! The vector-search capability boundary.
//!
//! The memory core is a pure consumer of nearest-neighbor search: it hands a
//! [`VectorCollection`] text and gets back matches ordered by distance, and
//! it never computes embeddings or distances itself. Embedding is likewise
//! injected through [`Embedder`]. The one adapter shipped here is
//! [`sqlite::SqliteCollection`]; alternative engines implement the same
//! traits.

pub mod sqlite;

use thiserror::Error;

use crate::memory::types::{MetadataFilter, QueryResult, RecordMetadata};

/// A record handed to or returned from the vector backend.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
}

/// Text-to-vector embedding, supplied by the host process.
pub trait Embedder: Send + Sync {
    /// Fixed output dimensionality; the backend sizes its index from this.
    fn dimensions(&self) -> usize;

    /// Embed each text. Must return exactly one vector per input, each of
    /// `dimensions()` length.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;
}

/// One named partition of the vector engine.
///
/// Write operations must be atomic per call: a concurrent reader sees either
/// the whole `upsert` batch or none of it.
pub trait VectorCollection: Send + Sync {
    /// Insert or overwrite records by id.
    fn upsert(&self, records: &[VectorRecord]) -> Result<(), VectorError>;

    /// Nearest-neighbor matches for `text`, ascending distance, at most
    /// `limit`. An empty collection yields an empty vec, not an error.
    fn query(
        &self,
        text: &str,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>, VectorError>;

    /// Every record, optionally filtered. No similarity search, no ordering
    /// guarantee; results carry no distance.
    fn get_all(&self, filter: Option<&MetadataFilter>) -> Result<Vec<QueryResult>, VectorError>;

    /// Delete by id. Unknown ids are ignored.
    fn delete(&self, ids: &[String]) -> Result<(), VectorError>;

    fn count(&self) -> Result<u64, VectorError>;
}

/// Failures at the vector capability boundary. The core propagates these as
/// typed errors and never retries; retry/backoff policy belongs to the
/// adapter if anywhere.
#[derive(Debug, Error)]
pub enum VectorError {
    /// The backend is unreachable or in an unusable state.
    #[error("vector backend unavailable: {0}")]
    Unavailable(String),

    /// An error surfaced by the sqlite backend.
    #[error(transparent)]
    Backend(#[from] rusqlite::Error),

    /// The injected embedder failed or returned malformed output.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A stored record carries metadata that no longer parses against the
    /// closed schema.
    #[error("malformed record metadata")]
    Metadata(#[from] serde_json::Error),
}
