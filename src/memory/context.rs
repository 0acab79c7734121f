//! Context assembly — one prompt-ready string under a token budget.
//!
//! Blends the three collections in fixed priority order: identity first,
//! then project knowledge, then conversation history. The budget is greedy
//! and distance-ordered, not globally optimal — a lower-priority section is
//! capped by what higher-priority sections already consumed, never the
//! reverse. Assembly never fails: a collection that errors or matches
//! nothing simply contributes no section, and the result may legitimately
//! be empty.

use tracing::warn;

use crate::config::ExocortexConfig;
use crate::memory::store::MemoryStore;
use crate::memory::types::Collection;

/// Rough token estimate: four characters per token. A documented heuristic,
/// not real tokenization.
const CHARS_PER_TOKEN: usize = 4;

/// A lower-priority section is only attempted while at least this many
/// tokens remain.
const MIN_SECTION_TOKENS: usize = 200;

/// Separator between result texts within a section.
const RESULT_SEPARATOR: &str = "\n\n---\n\n";

/// Separator between rendered sections.
const SECTION_SEPARATOR: &str = "\n\n";

const IDENTITY_HEADER: &str = "### Identity";
const PROJECT_HEADER: &str = "### Project Context";
const CONVERSATION_HEADER: &str = "### Past Conversations";

pub struct ContextAssembler<'a> {
    store: &'a MemoryStore,
    identity_results: usize,
    project_results: usize,
    conversation_results: usize,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(store: &'a MemoryStore) -> Self {
        Self {
            store,
            identity_results: 3,
            project_results: 5,
            conversation_results: 5,
        }
    }

    /// Assembler configured from the shared config's retrieval section.
    pub fn from_config(store: &'a MemoryStore, config: &ExocortexConfig) -> Self {
        Self {
            store,
            identity_results: config.retrieval.identity_results,
            project_results: config.retrieval.project_results,
            conversation_results: config.retrieval.conversation_results,
        }
    }

    /// Build the context string for `query` under roughly `max_tokens`.
    ///
    /// Sections appear in priority order (identity > project >
    /// conversation) and are never re-ranked across sections; only results
    /// within a section are ordered by distance. Sections with nothing to
    /// contribute are omitted entirely.
    pub fn assemble(&self, query: &str, max_tokens: usize) -> String {
        let mut remaining = max_tokens;
        let mut sections: Vec<String> = Vec::new();

        // Identity is small and always included when anything matches.
        if let Some(section) = self.identity_section(query) {
            remaining = remaining.saturating_sub(section.len() / CHARS_PER_TOKEN);
            sections.push(section);
        }

        if remaining > MIN_SECTION_TOKENS {
            // Project gets half the remaining budget so conversations are
            // not starved outright.
            let budget_chars = (remaining / 2) * CHARS_PER_TOKEN;
            if let Some(section) = self.results_section(
                query,
                Collection::Project,
                self.project_results,
                budget_chars,
                PROJECT_HEADER,
            ) {
                remaining = remaining.saturating_sub(section.len() / CHARS_PER_TOKEN);
                sections.push(section);
            }
        }

        if remaining > MIN_SECTION_TOKENS {
            let budget_chars = remaining * CHARS_PER_TOKEN;
            if let Some(section) = self.results_section(
                query,
                Collection::Conversations,
                self.conversation_results,
                budget_chars,
                CONVERSATION_HEADER,
            ) {
                sections.push(section);
            }
        }

        sections.join(SECTION_SEPARATOR)
    }

    /// Top identity matches rendered as a bulleted list, or `None` when
    /// nothing matches.
    fn identity_section(&self, query: &str) -> Option<String> {
        let results = match self
            .store
            .query(query, Collection::Identity, self.identity_results, None)
        {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "identity lookup failed, omitting section");
                return None;
            }
        };
        if results.is_empty() {
            return None;
        }
        let body: Vec<String> = results.iter().map(|r| format!("- {}", r.text)).collect();
        Some(format!("{IDENTITY_HEADER}\n{}", body.join("\n")))
    }

    /// Accumulate result texts in ascending-distance order until the next
    /// one would exceed `budget_chars`; never truncate mid-result.
    fn results_section(
        &self,
        query: &str,
        collection: Collection,
        limit: usize,
        budget_chars: usize,
        header: &str,
    ) -> Option<String> {
        let results = match self.store.query(query, collection, limit, None) {
            Ok(results) => results,
            Err(e) => {
                warn!(%collection, error = %e, "lookup failed, omitting section");
                return None;
            }
        };

        let mut parts: Vec<String> = Vec::new();
        let mut used_chars = 0usize;
        for result in results {
            if used_chars + result.text.len() > budget_chars {
                break;
            }
            used_chars += result.text.len();
            parts.push(result.text);
        }

        if parts.is_empty() {
            return None;
        }
        Some(format!("{header}\n{}", parts.join(RESULT_SEPARATOR)))
    }
}
