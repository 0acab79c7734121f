//! sqlite-vec backed vector collections.
//!
//! One database file holds all three partitions: a `records` table keyed by
//! `(collection, id)` for text and metadata, and one `vec0` virtual table per
//! partition for the embeddings. All writes for a call run inside a single
//! transaction, so a batch becomes visible atomically.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Once};

use rusqlite::{params, Connection, OptionalExtension};
use sqlite_vec::sqlite3_vec_init;

use crate::memory::now_epoch;
use crate::memory::types::{metadata_matches, Collection, MetadataFilter, QueryResult};
use crate::vector::{Embedder, VectorCollection, VectorError, VectorRecord};

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL CHECK(collection IN ('project_context','conversations','identity')),
    id TEXT NOT NULL,
    text TEXT NOT NULL,
    metadata TEXT NOT NULL,
    timestamp REAL NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_records_timestamp ON records(collection, timestamp);
"#;

/// Initialize all tables. Idempotent. The vec0 tables are sized from the
/// injected embedder's dimensionality, so `dimensions` must stay constant
/// for the lifetime of a database file.
pub fn init_schema(conn: &Connection, dimensions: usize) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    for collection in Collection::ALL {
        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING vec0(
                id TEXT PRIMARY KEY,
                embedding FLOAT[{dimensions}]
            );",
            vec_table(collection)
        ))?;
    }
    Ok(())
}

/// Open (or create) the store database at `path` with the extension loaded
/// and schema initialized.
pub fn open_database(path: impl AsRef<Path>, dimensions: usize) -> Result<Connection, VectorError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            VectorError::Unavailable(format!("cannot create {}: {e}", parent.display()))
        })?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)?;
    // WAL for concurrent readers behind a single writer
    conn.pragma_update(None, "journal_mode", "WAL")?;
    init_schema(&conn, dimensions)?;

    tracing::info!(path = %path.display(), dimensions, "vector store initialized");
    Ok(conn)
}

/// Name of the vec0 table for a partition.
fn vec_table(collection: Collection) -> &'static str {
    match collection {
        Collection::Project => "vec_project_context",
        Collection::Conversations => "vec_conversations",
        Collection::Identity => "vec_identity",
    }
}

/// One partition of a sqlite-vec database, implementing the capability
/// contract the memory store consumes.
///
/// The connection is shared across the three partitions and guarded by a
/// mutex: writes are mutually exclusive and reads block briefly behind an
/// in-flight write, which satisfies the store's consistency discipline.
pub struct SqliteCollection {
    conn: Arc<Mutex<Connection>>,
    collection: Collection,
    embedder: Arc<dyn Embedder>,
}

impl SqliteCollection {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        collection: Collection,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            conn,
            collection,
            embedder,
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, VectorError> {
        self.conn
            .lock()
            .map_err(|_| VectorError::Unavailable("connection lock poisoned".into()))
    }

    /// Embed texts and verify the embedder honored its own contract.
    fn embed_checked(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        let embeddings = self.embedder.embed(texts)?;
        if embeddings.len() != texts.len() {
            return Err(VectorError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        let dims = self.embedder.dimensions();
        if let Some(bad) = embeddings.iter().find(|v| v.len() != dims) {
            return Err(VectorError::Embedding(format!(
                "expected {dims}-dim vectors, got {}",
                bad.len()
            )));
        }
        Ok(embeddings)
    }

    fn row_to_result(
        id: String,
        text: String,
        metadata_json: &str,
        distance: Option<f64>,
    ) -> Result<QueryResult, VectorError> {
        Ok(QueryResult {
            id,
            text,
            metadata: serde_json::from_str(metadata_json)?,
            distance,
        })
    }
}

impl VectorCollection for SqliteCollection {
    fn upsert(&self, records: &[VectorRecord]) -> Result<(), VectorError> {
        if records.is_empty() {
            return Ok(());
        }

        // Embed outside the lock; only the writes need exclusion.
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let embeddings = self.embed_checked(&texts)?;

        let mut guard = self.conn()?;
        let tx = guard.transaction()?;
        {
            let vec_table = vec_table(self.collection);
            let mut insert_record = tx.prepare(
                "INSERT INTO records (collection, id, text, metadata, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(collection, id) DO UPDATE SET \
                 text = excluded.text, metadata = excluded.metadata, timestamp = excluded.timestamp",
            )?;
            let mut delete_vec = tx.prepare(&format!("DELETE FROM {vec_table} WHERE id = ?1"))?;
            let mut insert_vec = tx.prepare(&format!(
                "INSERT INTO {vec_table} (id, embedding) VALUES (?1, ?2)"
            ))?;

            for (record, embedding) in records.iter().zip(&embeddings) {
                let mut metadata = record.metadata.clone();
                let timestamp = metadata.timestamp.unwrap_or_else(now_epoch);
                metadata.timestamp = Some(timestamp);
                let metadata_json = serde_json::to_string(&metadata)?;

                insert_record.execute(params![
                    self.collection.as_str(),
                    record.id,
                    record.text,
                    metadata_json,
                    timestamp,
                ])?;
                // vec0 has no upsert; replace by delete + insert
                delete_vec.execute(params![record.id])?;
                insert_vec.execute(params![record.id, embedding_bytes(embedding)])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query(
        &self,
        text: &str,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>, VectorError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let embeddings = self.embed_checked(&[text])?;
        let embedding = &embeddings[0];

        // Post-filtering discards candidates, so over-fetch when a filter
        // is present.
        let candidate_limit = if filter.is_some() { limit * 4 } else { limit };

        let guard = self.conn()?;
        let mut stmt = guard.prepare(&format!(
            "SELECT id, distance FROM {} WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
            vec_table(self.collection)
        ))?;
        let candidates: Vec<(String, f64)> = stmt
            .query_map(
                params![embedding_bytes(embedding), candidate_limit as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut fetch = guard
            .prepare("SELECT text, metadata FROM records WHERE collection = ?1 AND id = ?2")?;

        let mut results = Vec::new();
        for (id, distance) in candidates {
            let row: Option<(String, String)> = fetch
                .query_row(params![self.collection.as_str(), id], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?;
            let Some((text, metadata_json)) = row else {
                continue;
            };
            let result = Self::row_to_result(id, text, &metadata_json, Some(distance))?;
            if let Some(filter) = filter {
                if !metadata_matches(&result.metadata, filter) {
                    continue;
                }
            }
            results.push(result);
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }

    fn get_all(&self, filter: Option<&MetadataFilter>) -> Result<Vec<QueryResult>, VectorError> {
        let guard = self.conn()?;
        let mut stmt =
            guard.prepare("SELECT id, text, metadata FROM records WHERE collection = ?1")?;
        let rows: Vec<(String, String, String)> = stmt
            .query_map(params![self.collection.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut results = Vec::new();
        for (id, text, metadata_json) in rows {
            let result = Self::row_to_result(id, text, &metadata_json, None)?;
            if let Some(filter) = filter {
                if !metadata_matches(&result.metadata, filter) {
                    continue;
                }
            }
            results.push(result);
        }
        Ok(results)
    }

    fn delete(&self, ids: &[String]) -> Result<(), VectorError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut guard = self.conn()?;
        let tx = guard.transaction()?;
        {
            let mut delete_record =
                tx.prepare("DELETE FROM records WHERE collection = ?1 AND id = ?2")?;
            let mut delete_vec = tx.prepare(&format!(
                "DELETE FROM {} WHERE id = ?1",
                vec_table(self.collection)
            ))?;
            for id in ids {
                delete_record.execute(params![self.collection.as_str(), id])?;
                delete_vec.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count(&self) -> Result<u64, VectorError> {
        let guard = self.conn()?;
        let count: i64 = guard.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![self.collection.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Reinterpret an f32 slice as raw bytes for sqlite-vec.
fn embedding_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}
