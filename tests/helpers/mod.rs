#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use exocortex::memory::store::MemoryStore;
use exocortex::memory::types::Collection;
use exocortex::vector::sqlite::{init_schema, load_sqlite_vec, SqliteCollection};
use exocortex::vector::{Embedder, VectorError};
use rusqlite::Connection;

pub const TEST_DIMS: usize = 32;

/// Deterministic bag-of-words embedder: each token hashes to a dimension,
/// L2-normalized. Texts sharing words land closer together, which is enough
/// structure to exercise ranking without a real model.
pub struct BagEmbedder;

impl Embedder for BagEmbedder {
    fn dimensions(&self) -> usize {
        TEST_DIMS
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; TEST_DIMS];
                for token in text
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|t| !t.is_empty())
                {
                    use std::hash::{Hash, Hasher};
                    let mut hasher = std::collections::hash_map::DefaultHasher::new();
                    token.hash(&mut hasher);
                    v[(hasher.finish() as usize) % TEST_DIMS] += 1.0;
                }
                let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    v.iter_mut().for_each(|x| *x /= norm);
                }
                v
            })
            .collect())
    }
}

/// A fresh store over an in-memory database with all three partitions wired
/// to the bag-of-words embedder.
pub fn test_store() -> MemoryStore {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().unwrap();
    init_schema(&conn, TEST_DIMS).unwrap();
    let conn = Arc::new(Mutex::new(conn));
    let embedder: Arc<dyn Embedder> = Arc::new(BagEmbedder);
    MemoryStore::new(
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
    )
}
