mod helpers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use exocortex::chunker::Chunker;
use exocortex::error::MemoryError;
use exocortex::memory::ingest::DocumentIngester;
use exocortex::memory::types::{Collection, MetadataDetail};
use helpers::test_store;

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn ingest_file_chunks_and_tags_records() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "notes.md",
        "first paragraph about the gateway\n\nsecond paragraph about the worker pool\n\nthird paragraph about deploys",
    );

    let ingester = DocumentIngester::new(&store, Chunker::new(60, 10));
    let chunks = ingester
        .ingest_file(&path, Collection::Project, None, false)
        .unwrap();
    assert!(chunks >= 2);
    assert_eq!(
        store.stats().unwrap()[&Collection::Project],
        chunks as u64
    );

    let results = store
        .query("gateway", Collection::Project, 1, None)
        .unwrap();
    match &results[0].metadata.detail {
        MetadataDetail::Chunk {
            source,
            total_chunks,
            ..
        } => {
            assert_eq!(source, "notes.md");
            assert_eq!(*total_chunks, chunks);
        }
        other => panic!("wrong metadata detail: {other:?}"),
    }
}

#[test]
fn ingest_missing_file_is_not_found() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let ingester = DocumentIngester::new(&store, Chunker::new(100, 20));

    let err = ingester
        .ingest_file(
            dir.path().join("absent.md"),
            Collection::Project,
            None,
            false,
        )
        .unwrap_err();
    assert!(matches!(err, MemoryError::NotFound(_)));
}

#[test]
fn reingesting_same_source_overwrites_instead_of_duplicating() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "doc.md", "alpha paragraph\n\nbeta paragraph");

    let ingester = DocumentIngester::new(&store, Chunker::new(20, 0));
    let first = ingester
        .ingest_file(&path, Collection::Project, None, false)
        .unwrap();
    let second = ingester
        .ingest_file(&path, Collection::Project, None, false)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(
        store.stats().unwrap()[&Collection::Project],
        first as u64
    );
}

#[test]
fn clear_first_wipes_the_collection() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let old = write_file(&dir, "old.md", "stale content");
    let new = write_file(&dir, "new.md", "fresh content");

    let ingester = DocumentIngester::new(&store, Chunker::new(100, 0));
    ingester
        .ingest_file(&old, Collection::Project, None, false)
        .unwrap();
    let chunks = ingester
        .ingest_file(&new, Collection::Project, None, true)
        .unwrap();

    assert_eq!(
        store.stats().unwrap()[&Collection::Project],
        chunks as u64
    );
    let results = store.query("content", Collection::Project, 5, None).unwrap();
    assert!(results.iter().all(|r| r.text != "stale content"));
}

#[test]
fn empty_file_ingests_zero_chunks() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "empty.md", "  \n\n  ");

    let ingester = DocumentIngester::new(&store, Chunker::new(100, 20));
    let chunks = ingester
        .ingest_file(&path, Collection::Project, None, false)
        .unwrap();
    assert_eq!(chunks, 0);
    assert_eq!(store.stats().unwrap()[&Collection::Project], 0);
}

#[test]
fn directory_ingestion_filters_by_extension() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir, "a.md", "first document body");
    write_file(&dir, "b.md", "second document body");
    write_file(&dir, "c.rs", "fn main() {}");

    let ingester = DocumentIngester::new(&store, Chunker::new(100, 0));
    let report = ingester
        .ingest_directory(dir.path(), Collection::Project, &["md"], false)
        .unwrap();

    assert_eq!(report.files_ingested, 2);
    assert_eq!(report.total_chunks, 2);
    assert!(report.errors.is_empty());
    assert_eq!(store.stats().unwrap()[&Collection::Project], 2);
}

#[test]
fn directory_ingestion_of_missing_dir_is_not_found() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let ingester = DocumentIngester::new(&store, Chunker::new(100, 0));

    let err = ingester
        .ingest_directory(dir.path().join("nope"), Collection::Project, &["md"], false)
        .unwrap_err();
    assert!(matches!(err, MemoryError::NotFound(_)));
}

#[cfg(unix)]
#[test]
fn directory_ingestion_isolates_unreadable_files() {
    use std::os::unix::fs::PermissionsExt;

    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir, "a.md", "first document body");
    write_file(&dir, "b.md", "second document body");
    let bad = write_file(&dir, "locked.md", "cannot be read");
    std::fs::set_permissions(&bad, std::fs::Permissions::from_mode(0o000)).unwrap();
    if std::fs::read(&bad).is_ok() {
        // Running with CAP_DAC_OVERRIDE (e.g. as root); the read failure
        // cannot be simulated here.
        return;
    }

    let ingester = DocumentIngester::new(&store, Chunker::new(100, 0));
    let report = ingester
        .ingest_directory(dir.path(), Collection::Project, &["md"], false)
        .unwrap();

    assert_eq!(report.files_ingested, 2);
    assert_eq!(report.total_chunks, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, bad);
    assert!(matches!(report.errors[0].1, MemoryError::Io { .. }));
    assert_eq!(store.stats().unwrap()[&Collection::Project], 2);
}

#[test]
fn cancellation_stops_between_files() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir, "a.md", "one");
    write_file(&dir, "b.md", "two");

    let cancel = Arc::new(AtomicBool::new(false));
    cancel.store(true, Ordering::Relaxed);

    let ingester = DocumentIngester::new(&store, Chunker::new(100, 0))
        .with_cancel_flag(Arc::clone(&cancel));
    let report = ingester
        .ingest_directory(dir.path(), Collection::Project, &["md"], false)
        .unwrap();

    assert_eq!(report.files_ingested, 0);
    assert_eq!(store.stats().unwrap()[&Collection::Project], 0);
}

#[test]
fn sub_batching_inserts_every_chunk() {
    let store = test_store();
    let dir = tempfile::tempdir().unwrap();
    let paras: Vec<String> = (0..12).map(|i| format!("paragraph number {i}")).collect();
    let path = write_file(&dir, "long.md", &paras.join("\n\n"));

    // Batch size smaller than the chunk count forces several sub-batches.
    let ingester =
        DocumentIngester::new(&store, Chunker::new(20, 0)).with_batch_size(3);
    let chunks = ingester
        .ingest_file(&path, Collection::Project, Some("long"), false)
        .unwrap();

    assert_eq!(chunks, 12);
    assert_eq!(store.stats().unwrap()[&Collection::Project], 12);
}
