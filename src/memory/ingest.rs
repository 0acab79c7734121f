//! Ingestion pipeline — files and directories in, chunked records out.
//!
//! A file becomes overlapping chunks (via [`Chunker`]), each tagged with
//! source/position metadata and a deterministic id derived from the source
//! name and chunk index. Re-ingesting the same source therefore overwrites
//! in place instead of accumulating duplicates.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::chunker::Chunker;
use crate::config::ExocortexConfig;
use crate::error::MemoryError;
use crate::memory::store::MemoryStore;
use crate::memory::types::{Collection, MetadataDetail, RecordMetadata};

/// Records inserted per store call. Bounds peak memory and request size on
/// large documents.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Aggregate outcome of a directory ingestion. Per-file failures are
/// isolated: each appears here with its path and the remaining files still
/// ran.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub total_chunks: usize,
    pub files_ingested: usize,
    pub errors: Vec<(PathBuf, MemoryError)>,
}

pub struct DocumentIngester<'a> {
    store: &'a MemoryStore,
    chunker: Chunker,
    batch_size: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> DocumentIngester<'a> {
    pub fn new(store: &'a MemoryStore, chunker: Chunker) -> Self {
        Self {
            store,
            chunker,
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: None,
        }
    }

    /// Ingester configured from the shared config's chunking section.
    pub fn from_config(store: &'a MemoryStore, config: &ExocortexConfig) -> Self {
        Self::new(
            store,
            Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap),
        )
        .with_batch_size(config.chunking.batch_size)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Directory ingestion checks this flag between files and stops early
    /// when it is set. Mid-file work is never interrupted; it is bounded by
    /// file size.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Ingest one file into `collection`, returning the number of chunks
    /// inserted.
    ///
    /// Undecodable bytes are dropped rather than failing the ingestion —
    /// lossy but available. With `clear_first` the target collection is
    /// wiped before inserting, for idempotent re-ingestion of a canonical
    /// document.
    ///
    /// Inserts run in fixed-size sub-batches. A failing sub-batch does not
    /// undo earlier ones: the error reports how many records are already
    /// visible and the rest were never written.
    pub fn ingest_file(
        &self,
        path: impl AsRef<Path>,
        collection: Collection,
        source_name: Option<&str>,
        clear_first: bool,
    ) -> Result<usize, MemoryError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(MemoryError::NotFound(path.to_path_buf()));
        }

        info!(path = %path.display(), %collection, "ingesting file");

        let bytes = std::fs::read(path).map_err(|source| MemoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);

        if clear_first {
            self.store.clear_collection(collection)?;
        }

        let chunks = self.chunker.chunk(&text);
        if chunks.is_empty() {
            return Ok(0);
        }

        let source = source_name
            .map(str::to_string)
            .unwrap_or_else(|| file_name(path));
        let total = chunks.len();

        let metadatas: Vec<RecordMetadata> = (0..total)
            .map(|i| {
                RecordMetadata::new(MetadataDetail::Chunk {
                    source: source.clone(),
                    chunk_index: i,
                    total_chunks: total,
                    file_path: path.display().to_string(),
                })
            })
            .collect();
        let ids: Vec<String> = (0..total).map(|i| chunk_id(&source, i)).collect();

        let mut inserted = 0usize;
        for start in (0..total).step_by(self.batch_size) {
            let end = (start + self.batch_size).min(total);
            let result = self.store.add_batch(
                &chunks[start..end],
                collection,
                Some(metadatas[start..end].to_vec()),
                Some(ids[start..end].to_vec()),
            );
            if let Err(source) = result {
                if inserted > 0 {
                    return Err(MemoryError::PartialBatch {
                        inserted,
                        total,
                        source: Box::new(source),
                    });
                }
                return Err(source);
            }
            inserted = end;
        }

        info!(chunks = total, source = %source, %collection, "ingested file");
        Ok(total)
    }

    /// Ingest every matching file under `dir`. One file's failure is logged
    /// and recorded, never aborting the remaining files.
    ///
    /// `extensions` are matched case-insensitively, with or without a
    /// leading dot (`".md"` and `"md"` are equivalent).
    pub fn ingest_directory(
        &self,
        dir: impl AsRef<Path>,
        collection: Collection,
        extensions: &[&str],
        recursive: bool,
    ) -> Result<IngestReport, MemoryError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(MemoryError::NotFound(dir.to_path_buf()));
        }

        let mut report = IngestReport::default();
        for path in matching_files(dir, extensions, recursive) {
            if self.cancelled() {
                info!(%collection, "directory ingestion cancelled");
                break;
            }
            match self.ingest_file(&path, collection, None, false) {
                Ok(chunks) => {
                    report.total_chunks += chunks;
                    report.files_ingested += 1;
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to ingest file");
                    report.errors.push((path, e));
                }
            }
        }

        info!(
            files = report.files_ingested,
            chunks = report.total_chunks,
            failures = report.errors.len(),
            %collection,
            "directory ingestion finished"
        );
        Ok(report)
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Deterministic chunk id: the same source and index always map to the same
/// id, so re-ingesting a source overwrites its previous chunks.
fn chunk_id(source: &str, index: usize) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{source}_{index}").as_bytes(),
    )
    .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Files under `dir` whose extension matches, in deterministic path order.
fn matching_files(dir: &Path, extensions: &[&str], recursive: bool) -> Vec<PathBuf> {
    let walker = if recursive {
        WalkDir::new(dir)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    walker
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase());
            match ext {
                Some(ext) => extensions
                    .iter()
                    .any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(&ext)),
                None => false,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_deterministic_per_source_and_index() {
        assert_eq!(chunk_id("README", 3), chunk_id("README", 3));
        assert_ne!(chunk_id("README", 3), chunk_id("README", 4));
        assert_ne!(chunk_id("README", 3), chunk_id("NOTES", 3));
    }

    #[test]
    fn matching_files_honors_extensions_and_depth() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "x").unwrap();
        std::fs::write(dir.path().join("b.txt"), "x").unwrap();
        std::fs::write(dir.path().join("c.rs"), "x").unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("d.md"), "x").unwrap();

        let flat = matching_files(dir.path(), &[".md", "txt"], false);
        let names: Vec<String> = flat.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);

        let deep = matching_files(dir.path(), &[".md"], true);
        let names: Vec<String> = deep.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.md", "d.md"]);
    }
}
