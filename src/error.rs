//! Error taxonomy for the memory core.
//!
//! Single-item operations surface these to the immediate caller; fan-out
//! operations ([`crate::memory::store::MemoryStore::query_all_collections`],
//! [`crate::memory::ingest::DocumentIngester::ingest_directory`]) isolate
//! per-item failures and aggregate them instead of propagating.

use std::path::PathBuf;
use thiserror::Error;

use crate::vector::VectorError;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// A file or directory given to the ingestion pipeline does not exist.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// A collection name outside the three fixed partitions.
    #[error("unknown collection: {0}")]
    InvalidCollection(String),

    /// Parallel arrays passed to a batch insert have different lengths.
    #[error("batch arity mismatch: {texts} texts but {other} {field}")]
    ArityMismatch {
        texts: usize,
        other: usize,
        field: &'static str,
    },

    /// The vector-search backend failed or is unreachable. Callers should
    /// treat this as a soft, retryable condition.
    #[error("vector capability unavailable")]
    Capability(#[from] VectorError),

    /// A multi-sub-batch insert failed partway. Records `[0..inserted)` are
    /// visible; the rest were never written. Prior sub-batches are not
    /// rolled back.
    #[error("batch partially applied: {inserted} of {total} records visible")]
    PartialBatch {
        inserted: usize,
        total: usize,
        #[source]
        source: Box<MemoryError>,
    },

    /// An unreadable file (distinct from undecodable content, which is
    /// tolerated by lossy decoding).
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The identity facts file exists but is not valid JSON of the expected
    /// `{category: [fact, ...]}` shape.
    #[error("invalid identity facts file {path}")]
    IdentityFacts {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The config file exists but is not valid TOML.
    #[error("invalid config file {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
