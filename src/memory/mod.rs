//! Memory engine: the store façade, ingestion, context assembly, and
//! identity population.

pub mod context;
pub mod identity;
pub mod ingest;
pub mod store;
pub mod types;

use tracing::{info, warn};

use crate::config::ExocortexConfig;
use crate::error::MemoryError;
use crate::memory::identity::IdentityLoader;
use crate::memory::ingest::DocumentIngester;
use crate::memory::store::MemoryStore;
use crate::memory::types::Collection;

/// Wall-clock time as epoch seconds, the timestamp format stored in record
/// metadata.
pub(crate) fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Outcome of [`bootstrap`]. Best-effort: errors are collected, never thrown.
#[derive(Debug, Default)]
pub struct BootstrapReport {
    pub project_chunks: usize,
    pub identity_facts: usize,
    pub errors: Vec<MemoryError>,
}

/// Startup seam for sibling services: ingest the canonical project document
/// if the project collection is empty, and populate identity facts if the
/// identity collection is empty.
///
/// Safe to call on every startup — populated collections are left untouched,
/// and any failure is recorded in the report rather than propagated so a
/// degraded memory never blocks service start.
pub fn bootstrap(store: &MemoryStore, config: &ExocortexConfig) -> BootstrapReport {
    let mut report = BootstrapReport::default();

    let stats = match store.stats() {
        Ok(stats) => stats,
        Err(e) => {
            warn!(error = %e, "bootstrap could not read collection stats");
            report.errors.push(e);
            return report;
        }
    };

    if stats.get(&Collection::Project).copied().unwrap_or(0) == 0 {
        match config.resolved_project_document() {
            Some(doc) if doc.exists() => {
                let ingester = DocumentIngester::from_config(store, config);
                match ingester.ingest_file(
                    &doc,
                    Collection::Project,
                    doc.file_stem().and_then(|s| s.to_str()),
                    true,
                ) {
                    Ok(chunks) => report.project_chunks = chunks,
                    Err(e) => {
                        warn!(error = %e, path = %doc.display(), "project document ingest failed");
                        report.errors.push(e);
                    }
                }
            }
            Some(doc) => {
                info!(path = %doc.display(), "no project document to bootstrap from");
            }
            None => {}
        }
    }

    if stats.get(&Collection::Identity).copied().unwrap_or(0) == 0 {
        let loader = IdentityLoader::from_config(store, config);
        match loader.populate(false) {
            Ok(count) => report.identity_facts = count,
            Err(e) => {
                warn!(error = %e, "identity population failed");
                report.errors.push(e);
            }
        }
    }

    info!(
        project_chunks = report.project_chunks,
        identity_facts = report.identity_facts,
        errors = report.errors.len(),
        "memory bootstrap finished"
    );
    report
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
