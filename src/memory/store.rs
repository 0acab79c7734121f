//! The store façade over the three fixed collections.
//!
//! [`MemoryStore`] is an explicit handle constructed once at process start
//! and passed by reference to every consumer — there is deliberately no
//! process-wide singleton, so tests run against isolated instances. It is
//! the authority on collection identity and stats; all persistence and
//! similarity search is delegated to the injected [`VectorCollection`]s.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::MemoryError;
use crate::memory::types::{
    Collection, MetadataDetail, MetadataFilter, QueryResult, RecordMetadata,
};
use crate::memory::{now_epoch, truncate_chars};
use crate::vector::sqlite::{open_database, SqliteCollection};
use crate::vector::{Embedder, VectorCollection, VectorRecord};

/// Character length of the stored user-text preview on a conversation turn.
const TURN_PREVIEW_CHARS: usize = 100;

/// Aggregate of a cross-collection query. Collections that failed appear
/// with an empty result list and a typed entry in `errors`; the call itself
/// never fails.
#[derive(Debug)]
pub struct CrossCollectionResults {
    pub results: HashMap<Collection, Vec<QueryResult>>,
    pub errors: Vec<(Collection, MemoryError)>,
}

pub struct MemoryStore {
    project: Arc<dyn VectorCollection>,
    conversations: Arc<dyn VectorCollection>,
    identity: Arc<dyn VectorCollection>,
}

impl MemoryStore {
    /// Build a store from explicit collection handles. This is the seam for
    /// tests and for alternative vector backends.
    pub fn new(
        project: Arc<dyn VectorCollection>,
        conversations: Arc<dyn VectorCollection>,
        identity: Arc<dyn VectorCollection>,
    ) -> Self {
        Self {
            project,
            conversations,
            identity,
        }
    }

    /// Open (or create) a sqlite-vec backed store at `path`, wiring all
    /// three partitions to the given embedder.
    pub fn open(path: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self, MemoryError> {
        let conn = open_database(path, embedder.dimensions())?;
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self::new(
            Arc::new(SqliteCollection::new(
                Arc::clone(&conn),
                Collection::Project,
                Arc::clone(&embedder),
            )),
            Arc::new(SqliteCollection::new(
                Arc::clone(&conn),
                Collection::Conversations,
                Arc::clone(&embedder),
            )),
            Arc::new(SqliteCollection::new(conn, Collection::Identity, embedder)),
        ))
    }

    fn collection(&self, collection: Collection) -> &dyn VectorCollection {
        match collection {
            Collection::Project => self.project.as_ref(),
            Collection::Conversations => self.conversations.as_ref(),
            Collection::Identity => self.identity.as_ref(),
        }
    }

    /// Add a single record. When `id` is absent one is derived from a
    /// content prefix plus the wall clock — deterministic enough to be
    /// unique, not guaranteed. `metadata.timestamp` is defaulted if unset.
    ///
    /// Collection identity is enforced by the [`Collection`] enum; string
    /// names from external callers go through its `FromStr`, which rejects
    /// unknown partitions with [`MemoryError::InvalidCollection`].
    pub fn add_one(
        &self,
        text: &str,
        collection: Collection,
        metadata: Option<RecordMetadata>,
        id: Option<String>,
    ) -> Result<String, MemoryError> {
        let id = id.unwrap_or_else(|| derive_id(text, 0));
        let mut metadata = metadata.unwrap_or_default();
        if metadata.timestamp.is_none() {
            metadata.timestamp = Some(now_epoch());
        }
        self.collection(collection).upsert(&[VectorRecord {
            id: id.clone(),
            text: text.to_string(),
            metadata,
        }])?;
        debug!(%id, %collection, "added memory");
        Ok(id)
    }

    /// Add a batch of records atomically: either the whole batch is visible
    /// to subsequent queries or none of it is.
    ///
    /// `metadatas` and `ids`, when given, must match `texts` in length or
    /// the call fails with [`MemoryError::ArityMismatch`] before anything is
    /// written.
    pub fn add_batch(
        &self,
        texts: &[String],
        collection: Collection,
        metadatas: Option<Vec<RecordMetadata>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>, MemoryError> {
        if let Some(ref metadatas) = metadatas {
            if metadatas.len() != texts.len() {
                return Err(MemoryError::ArityMismatch {
                    texts: texts.len(),
                    other: metadatas.len(),
                    field: "metadatas",
                });
            }
        }
        if let Some(ref ids) = ids {
            if ids.len() != texts.len() {
                return Err(MemoryError::ArityMismatch {
                    texts: texts.len(),
                    other: ids.len(),
                    field: "ids",
                });
            }
        }

        let now = now_epoch();
        let mut metadatas = match metadatas {
            Some(m) => m,
            None => vec![RecordMetadata::default(); texts.len()],
        };
        for metadata in &mut metadatas {
            if metadata.timestamp.is_none() {
                metadata.timestamp = Some(now);
            }
        }
        let ids = match ids {
            Some(ids) => ids,
            None => texts
                .iter()
                .enumerate()
                .map(|(i, t)| derive_id(t, i))
                .collect(),
        };

        let records: Vec<VectorRecord> = texts
            .iter()
            .zip(&ids)
            .zip(metadatas)
            .map(|((text, id), metadata)| VectorRecord {
                id: id.clone(),
                text: text.clone(),
                metadata,
            })
            .collect();

        self.collection(collection).upsert(&records)?;
        info!(count = records.len(), %collection, "added memory batch");
        Ok(ids)
    }

    /// Semantic search within one collection, best match first. An empty
    /// collection or no match above the engine's threshold yields an empty
    /// vec, never an error.
    pub fn query(
        &self,
        text: &str,
        collection: Collection,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>, MemoryError> {
        Ok(self.collection(collection).query(text, limit, filter)?)
    }

    /// Query every collection independently. A failing collection reports
    /// an empty result list plus a typed error in the aggregate; one bad
    /// partition never poisons the others.
    pub fn query_all_collections(&self, text: &str, limit: usize) -> CrossCollectionResults {
        let mut results = HashMap::new();
        let mut errors = Vec::new();
        for collection in Collection::ALL {
            match self.query(text, collection, limit, None) {
                Ok(matches) => {
                    results.insert(collection, matches);
                }
                Err(e) => {
                    warn!(%collection, error = %e, "collection query failed");
                    results.insert(collection, Vec::new());
                    errors.push((collection, e));
                }
            }
        }
        CrossCollectionResults { results, errors }
    }

    /// Record count per collection.
    pub fn stats(&self) -> Result<HashMap<Collection, u64>, MemoryError> {
        let mut stats = HashMap::new();
        for collection in Collection::ALL {
            stats.insert(collection, self.collection(collection).count()?);
        }
        Ok(stats)
    }

    /// Delete every record in a collection. Idempotent: clearing an empty
    /// collection is a no-op. Returns the number of deleted records.
    pub fn clear_collection(&self, collection: Collection) -> Result<u64, MemoryError> {
        let handle = self.collection(collection);
        let ids: Vec<String> = handle
            .get_all(None)?
            .into_iter()
            .map(|r| r.id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        handle.delete(&ids)?;
        info!(count = ids.len(), %collection, "cleared collection");
        Ok(ids.len() as u64)
    }

    /// Capture one live conversation turn as a single record in the
    /// conversation collection.
    pub fn save_conversation_turn(
        &self,
        user_text: &str,
        assistant_text: &str,
        session_id: Option<&str>,
    ) -> Result<String, MemoryError> {
        let text = format!("User: {user_text}\n\nAssistant: {assistant_text}");
        let metadata = RecordMetadata::new(MetadataDetail::ChatTurn {
            preview: truncate_chars(user_text, TURN_PREVIEW_CHARS).to_string(),
            session_id: session_id.map(str::to_string),
        });
        // Live turns get random time-sortable ids, not content-derived ones.
        let id = Uuid::now_v7().to_string();
        self.add_one(&text, Collection::Conversations, Some(metadata), Some(id))
    }

    /// The most recent conversation turns, newest first, optionally scoped
    /// to a session.
    ///
    /// The vector engine has no native ordering primitive, so this fetches
    /// every matching record and sorts by timestamp here — an O(collection
    /// size) scan that is acceptable because conversation collections stay
    /// small. It is not a pagination primitive.
    pub fn recent_conversations(
        &self,
        limit: usize,
        session_id: Option<&str>,
    ) -> Result<Vec<QueryResult>, MemoryError> {
        let filter = session_id.map(|sid| {
            let mut filter = MetadataFilter::new();
            filter.insert("session_id".into(), sid.into());
            filter
        });

        let mut records = self.conversations.get_all(filter.as_ref())?;
        records.sort_by(|a, b| {
            let ta = a.metadata.timestamp.unwrap_or(0.0);
            let tb = b.metadata.timestamp.unwrap_or(0.0);
            tb.partial_cmp(&ta).unwrap_or(std::cmp::Ordering::Equal)
        });
        records.truncate(limit);
        Ok(records)
    }
}

/// Derive a record id from a content prefix plus the wall clock. Collision
/// probability is accepted as negligible, not guaranteed; `salt`
/// disambiguates identical texts within one batch.
fn derive_id(text: &str, salt: usize) -> String {
    let prefix = truncate_chars(text, 100);
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{prefix}{nanos}{salt}").as_bytes(),
    )
    .to_string()
}
