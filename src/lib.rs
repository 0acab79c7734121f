//! Persistent, multi-collection text memory for AI agents.
//!
//! Exocortex stores free text in three fixed collections — project knowledge,
//! conversation history, and identity facts — and retrieves it by semantic
//! similarity, either per collection or blended into one token-budgeted
//! context string ready to prepend to a prompt.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   virtual tables, one per collection
//! - **Embeddings**: injected via the [`vector::Embedder`] trait; the crate
//!   never computes vectors itself
//! - **Ingestion**: paragraph-aware chunking with overlap carry-forward and
//!   deterministic per-chunk ids, so re-ingesting a source overwrites in place
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`chunker`] — Paragraph-aware text splitting with overlap
//! - [`vector`] — Vector-search capability traits and the SQLite adapter
//! - [`memory`] — Core memory engine: store, ingestion, context assembly, identity

pub mod chunker;
pub mod config;
pub mod error;
pub mod memory;
pub mod vector;
