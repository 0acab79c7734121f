//! Identity fact population — one-shot bulk load of fixed biographical
//! facts into the identity collection.
//!
//! The fact source is a static JSON mapping of category name to an ordered
//! list of fact strings. Loading is idempotent by default: a non-empty
//! identity collection is left alone unless forced.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::ExocortexConfig;
use crate::error::MemoryError;
use crate::memory::store::MemoryStore;
use crate::memory::types::{Collection, MetadataDetail, RecordMetadata};

/// Category name → ordered facts, as stored in the facts file.
pub type IdentityFacts = BTreeMap<String, Vec<String>>;

/// Load the facts file. A missing file is not an error — it yields `None`
/// and population becomes a no-op — but a file that exists and fails to
/// parse is rejected with a typed error rather than silently skipped.
pub fn load_identity_facts(path: impl AsRef<Path>) -> Result<Option<IdentityFacts>, MemoryError> {
    let path = path.as_ref();
    if !path.is_file() {
        warn!(path = %path.display(), "identity facts file not found");
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|source| MemoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let facts =
        serde_json::from_str(&contents).map_err(|source| MemoryError::IdentityFacts {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Some(facts))
}

pub struct IdentityLoader<'a> {
    store: &'a MemoryStore,
    facts_path: PathBuf,
}

impl<'a> IdentityLoader<'a> {
    pub fn new(store: &'a MemoryStore, facts_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            facts_path: facts_path.into(),
        }
    }

    pub fn from_config(store: &'a MemoryStore, config: &ExocortexConfig) -> Self {
        Self::new(store, config.resolved_facts_path())
    }

    /// Populate the identity collection, returning the number of facts
    /// loaded.
    ///
    /// Without `force`, an already-populated collection is left untouched
    /// and 0 is returned — the guard against duplicate loads. With `force`,
    /// the collection is cleared first. An absent or empty fact source also
    /// returns 0, which is not an error.
    pub fn populate(&self, force: bool) -> Result<usize, MemoryError> {
        if !force {
            let stats = self.store.stats()?;
            let existing = stats.get(&Collection::Identity).copied().unwrap_or(0);
            if existing > 0 {
                info!(existing, "identity collection already populated, skipping");
                return Ok(0);
            }
        }

        let Some(facts_by_category) = load_identity_facts(&self.facts_path)? else {
            return Ok(0);
        };

        if force {
            self.store.clear_collection(Collection::Identity)?;
        }

        let source = self
            .facts_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.facts_path.display().to_string());

        // Flatten category → facts into parallel text/metadata arrays.
        let mut texts: Vec<String> = Vec::new();
        let mut metadatas: Vec<RecordMetadata> = Vec::new();
        for (category, facts) in &facts_by_category {
            for fact in facts {
                texts.push(fact.clone());
                metadatas.push(RecordMetadata::new(MetadataDetail::IdentityFact {
                    category: category.clone(),
                    source: source.clone(),
                }));
            }
        }

        if texts.is_empty() {
            warn!(path = %self.facts_path.display(), "identity facts file is empty");
            return Ok(0);
        }

        let count = texts.len();
        self.store
            .add_batch(&texts, Collection::Identity, Some(metadatas), None)?;
        info!(count, "loaded identity facts");
        Ok(count)
    }
}
