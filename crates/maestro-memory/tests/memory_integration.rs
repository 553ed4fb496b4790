#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the maestro-memory crate.
//!
//! Covers FileKnowledgeStore persistence and replay, last-write-wins across
//! restarts, compaction, and concurrent writers on the in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;

use maestro_core::KnowledgeEntry;
use maestro_memory::{FileKnowledgeStore, InMemoryKnowledgeStore, KnowledgeStore};

// ---------------------------------------------------------------------------
// FileKnowledgeStore
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_store_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("knowledge").join("entries.jsonl");

    {
        let store = FileKnowledgeStore::open(path.clone()).await.unwrap();
        store
            .put(KnowledgeEntry::new("x", "t/a", json!("alpha")))
            .await
            .unwrap();
        store
            .put(KnowledgeEntry::new("y", "t/b", json!("beta")))
            .await
            .unwrap();
    }

    let reopened = FileKnowledgeStore::open(path).await.unwrap();
    assert_eq!(reopened.count().await.unwrap(), 2);
    let a = reopened.get("x", "t/a").await.unwrap().unwrap();
    assert_eq!(a.value, json!("alpha"));
}

#[tokio::test]
async fn file_store_replay_applies_last_write_wins() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("entries.jsonl");
    let now = Utc::now();

    // Write out-of-order lines by hand: the older entry comes last in the file.
    let newer = KnowledgeEntry::new("x", "k", json!("new")).at(now);
    let older = KnowledgeEntry::new("x", "k", json!("old")).at(now - Duration::seconds(10));
    let data = format!(
        "{}\n{}\n",
        serde_json::to_string(&newer).unwrap(),
        serde_json::to_string(&older).unwrap()
    );
    tokio::fs::write(&path, data).await.unwrap();

    let store = FileKnowledgeStore::open(path).await.unwrap();
    assert_eq!(store.get("x", "k").await.unwrap().unwrap().value, json!("new"));
}

#[tokio::test]
async fn file_store_does_not_persist_losing_writes() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("entries.jsonl");
    let now = Utc::now();

    let store = FileKnowledgeStore::open(path.clone()).await.unwrap();
    assert!(store
        .put(KnowledgeEntry::new("x", "k", json!(1)).at(now))
        .await
        .unwrap());
    assert!(!store
        .put(KnowledgeEntry::new("x", "k", json!(0)).at(now - Duration::seconds(1)))
        .await
        .unwrap());

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(contents.lines().count(), 1);
}

#[tokio::test]
async fn compact_keeps_one_line_per_key() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("entries.jsonl");
    let now = Utc::now();

    let store = FileKnowledgeStore::open(path.clone()).await.unwrap();
    for i in 0..4 {
        store
            .put(KnowledgeEntry::new("x", "k", json!(i)).at(now + Duration::seconds(i)))
            .await
            .unwrap();
    }
    let before = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(before.lines().count(), 4);

    store.compact().await.unwrap();
    let after = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(after.lines().count(), 1);
    assert!(after.contains('3'));
}

#[tokio::test]
async fn corrupt_file_reports_unavailable() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("entries.jsonl");
    tokio::fs::write(&path, "{not json}\n").await.unwrap();

    let err = FileKnowledgeStore::open(path).await.err().unwrap();
    assert!(matches!(
        err,
        maestro_core::MaestroError::KnowledgeStoreUnavailable(_)
    ));
}

// ---------------------------------------------------------------------------
// Concurrent writers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_writers_converge_on_newest() {
    let store = Arc::new(InMemoryKnowledgeStore::new());
    let base = Utc::now();

    let mut handles = Vec::new();
    for i in 0..16i64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .put(
                    KnowledgeEntry::new("shared", "k", json!(i))
                        .at(base + Duration::milliseconds(i)),
                )
                .await
                .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let winner = store.get("shared", "k").await.unwrap().unwrap();
    assert_eq!(winner.value, json!(15));
}
