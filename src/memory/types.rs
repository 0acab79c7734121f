//! Core record type definitions.
//!
//! Defines [`Collection`] (the three fixed partitions), [`RecordMetadata`]
//! (a closed, tagged metadata schema — malformed records are rejected at the
//! boundary instead of flowing through as loose maps), and [`QueryResult`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// The three fixed collections. Their persisted names are part of the
/// store's public contract and must not be renamed without a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Project history, decisions, and architecture.
    #[serde(rename = "project_context")]
    Project,
    /// Stored conversation turns.
    Conversations,
    /// Fixed biographical facts and preferences.
    Identity,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Project, Self::Conversations, Self::Identity];

    /// Persisted partition name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project_context",
            Self::Conversations => "conversations",
            Self::Identity => "identity",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project_context" => Ok(Self::Project),
            "conversations" => Ok(Self::Conversations),
            "identity" => Ok(Self::Identity),
            other => Err(MemoryError::InvalidCollection(other.to_string())),
        }
    }
}

/// Metadata attached to every stored record.
///
/// `timestamp` is epoch seconds, defaulted at insertion when absent; records
/// are otherwise immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(flatten)]
    pub detail: MetadataDetail,
}

impl RecordMetadata {
    pub fn new(detail: MetadataDetail) -> Self {
        Self {
            timestamp: None,
            detail,
        }
    }

    /// A bare record with no domain fields.
    pub fn note() -> Self {
        Self::new(MetadataDetail::Note)
    }
}

impl Default for RecordMetadata {
    fn default() -> Self {
        Self::note()
    }
}

/// The known per-record-type field sets, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetadataDetail {
    /// One segment of an ingested document.
    Chunk {
        source: String,
        chunk_index: usize,
        total_chunks: usize,
        file_path: String,
    },
    /// One captured live conversation turn.
    ChatTurn {
        /// Truncated preview of the user side of the turn.
        preview: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    /// One identity fact from the static fact source.
    IdentityFact { category: String, source: String },
    /// A plain directly-added record.
    Note,
}

/// Conjunctive equality predicate over serialized metadata fields.
///
/// Every `(field, value)` pair must match; no OR or range filters.
pub type MetadataFilter = BTreeMap<String, serde_json::Value>;

/// True when every filter field equals the corresponding serialized
/// metadata field.
pub fn metadata_matches(metadata: &RecordMetadata, filter: &MetadataFilter) -> bool {
    let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(metadata) else {
        return false;
    };
    filter.iter().all(|(key, want)| fields.get(key) == Some(want))
}

/// One match from a similarity query or an exact lookup.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
    /// Relevance score from the vector engine — lower is closer. `None` for
    /// exact `get`-style lookups that involved no similarity search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_round_trip() {
        for c in Collection::ALL {
            assert_eq!(c.as_str().parse::<Collection>().unwrap(), c);
        }
    }

    #[test]
    fn unknown_collection_name_is_typed_error() {
        let err = "scratch".parse::<Collection>().unwrap_err();
        assert!(matches!(err, MemoryError::InvalidCollection(name) if name == "scratch"));
    }

    #[test]
    fn metadata_serializes_with_type_tag() {
        let meta = RecordMetadata {
            timestamp: Some(1700000000.0),
            detail: MetadataDetail::ChatTurn {
                preview: "hi".into(),
                session_id: Some("s1".into()),
            },
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["type"], "chat_turn");
        assert_eq!(value["preview"], "hi");
        assert_eq!(value["session_id"], "s1");
    }

    #[test]
    fn chunk_metadata_round_trips() {
        let meta = RecordMetadata {
            timestamp: Some(12.5),
            detail: MetadataDetail::Chunk {
                source: "README".into(),
                chunk_index: 2,
                total_chunks: 7,
                file_path: "/tmp/README.md".into(),
            },
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: RecordMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn filter_is_conjunctive_equality() {
        let meta = RecordMetadata::new(MetadataDetail::IdentityFact {
            category: "work".into(),
            source: "facts.json".into(),
        });

        let mut filter = MetadataFilter::new();
        filter.insert("category".into(), "work".into());
        assert!(metadata_matches(&meta, &filter));

        filter.insert("source".into(), "other.json".into());
        assert!(!metadata_matches(&meta, &filter));

        let mut absent = MetadataFilter::new();
        absent.insert("session_id".into(), "s1".into());
        assert!(!metadata_matches(&meta, &absent));
    }
}
