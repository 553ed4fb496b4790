//! Shared knowledge storage for Maestro executors.
//!
//! Insights produced by successful subtasks are stored under a
//! `(domain, key)` address with a timestamp. Concurrent writers never
//! coordinate; the store resolves conflicts by last-write-wins.
//!
//! # Main types
//!
//! - [`KnowledgeStore`]: Trait for knowledge backends.
//! - [`InMemoryKnowledgeStore`]: Process-local store.
//! - [`FileKnowledgeStore`]: JSONL-backed store that survives restarts.

/// Knowledge store trait and implementations.
pub mod store;

pub use store::{FileKnowledgeStore, InMemoryKnowledgeStore, KnowledgeStore};
