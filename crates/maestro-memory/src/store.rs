use async_trait::async_trait;
use maestro_core::{KnowledgeEntry, MaestroError, MaestroResult};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Trait for knowledge storage backends.
///
/// Writes to the same `(domain, key)` are resolved by timestamp: the entry
/// with the newest timestamp wins, and equal timestamps are settled on the
/// value. Merging is therefore idempotent and commutative per key.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Store an entry. Returns `false` when a newer entry already exists.
    async fn put(&self, entry: KnowledgeEntry) -> MaestroResult<bool>;

    /// Fetch the current entry for `(domain, key)`.
    async fn get(&self, domain: &str, key: &str) -> MaestroResult<Option<KnowledgeEntry>>;

    /// List entries, optionally restricted to one domain, ordered by key.
    async fn list(&self, domain: Option<&str>) -> MaestroResult<Vec<KnowledgeEntry>>;

    /// Count stored `(domain, key)` pairs.
    async fn count(&self) -> MaestroResult<usize>;
}

type Key = (String, String);

/// In-memory knowledge store.
pub struct InMemoryKnowledgeStore {
    entries: RwLock<HashMap<Key, KnowledgeEntry>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `entry` with last-write-wins semantics.
fn merge(map: &mut HashMap<Key, KnowledgeEntry>, entry: KnowledgeEntry) -> bool {
    let key = (entry.domain.clone(), entry.key.clone());
    match map.get(&key) {
        Some(current) if !entry.supersedes(current) => false,
        _ => {
            map.insert(key, entry);
            true
        }
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn put(&self, entry: KnowledgeEntry) -> MaestroResult<bool> {
        let mut entries = self.entries.write().await;
        Ok(merge(&mut entries, entry))
    }

    async fn get(&self, domain: &str, key: &str) -> MaestroResult<Option<KnowledgeEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(domain.to_string(), key.to_string()))
            .cloned())
    }

    async fn list(&self, domain: Option<&str>) -> MaestroResult<Vec<KnowledgeEntry>> {
        let entries = self.entries.read().await;
        let mut filtered: Vec<KnowledgeEntry> = entries
            .values()
            .filter(|e| domain.map_or(true, |d| e.domain == d))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| (&a.domain, &a.key).cmp(&(&b.domain, &b.key)));
        Ok(filtered)
    }

    async fn count(&self) -> MaestroResult<usize> {
        let entries = self.entries.read().await;
        Ok(entries.len())
    }
}

/// File-backed knowledge store that persists accepted writes as JSONL.
/// Replays the file on creation (applying last-write-wins); appends on put.
pub struct FileKnowledgeStore {
    path: PathBuf,
    inner: InMemoryKnowledgeStore,
    /// Serializes appends so lines never interleave.
    write_lock: Mutex<()>,
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> MaestroError {
    MaestroError::KnowledgeStoreUnavailable(format!("{context}: {e}"))
}

impl FileKnowledgeStore {
    /// Open the store at `path`, loading any existing entries.
    pub async fn open(path: PathBuf) -> MaestroResult<Self> {
        let inner = InMemoryKnowledgeStore::new();

        if path.exists() {
            let data = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| unavailable("Failed to read knowledge store", e))?;
            let mut replayed = 0usize;
            for line in data.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry: KnowledgeEntry = serde_json::from_str(line)
                    .map_err(|e| unavailable("Invalid JSONL entry", e))?;
                inner.put(entry).await?;
                replayed += 1;
            }
            debug!(path = %path.display(), replayed, "knowledge store loaded");
        } else if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable("Failed to create dir", e))?;
        }

        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    async fn append_to_file(&self, entry: &KnowledgeEntry) -> MaestroResult<()> {
        use tokio::io::AsyncWriteExt;
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| unavailable("Failed to open knowledge store", e))?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| unavailable("Failed to write entry", e))?;
        Ok(())
    }

    /// Rewrite the file so it holds only the winning entry per key.
    pub async fn compact(&self) -> MaestroResult<()> {
        let _guard = self.write_lock.lock().await;
        let entries = self.inner.list(None).await?;
        let mut data = String::new();
        for entry in &entries {
            data.push_str(&serde_json::to_string(entry)?);
            data.push('\n');
        }
        tokio::fs::write(&self.path, data.as_bytes())
            .await
            .map_err(|e| unavailable("Failed to compact knowledge store", e))?;
        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for FileKnowledgeStore {
    async fn put(&self, entry: KnowledgeEntry) -> MaestroResult<bool> {
        // Losing writes are not persisted; replay would discard them anyway.
        if let Some(current) = self.inner.get(&entry.domain, &entry.key).await? {
            if !entry.supersedes(&current) {
                return Ok(false);
            }
        }
        self.append_to_file(&entry).await?;
        self.inner.put(entry).await
    }

    async fn get(&self, domain: &str, key: &str) -> MaestroResult<Option<KnowledgeEntry>> {
        self.inner.get(domain, key).await
    }

    async fn list(&self, domain: Option<&str>) -> MaestroResult<Vec<KnowledgeEntry>> {
        self.inner.list(domain).await
    }

    async fn count(&self) -> MaestroResult<usize> {
        self.inner.count().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryKnowledgeStore::new();
        assert_eq!(store.count().await.unwrap(), 0);

        store
            .put(KnowledgeEntry::new("x", "t1/a", json!("insight")))
            .await
            .unwrap();
        let got = store.get("x", "t1/a").await.unwrap().unwrap();
        assert_eq!(got.value, json!("insight"));
        assert!(store.get("y", "t1/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_older_write_is_ignored() {
        let store = InMemoryKnowledgeStore::new();
        let now = Utc::now();

        let newer = KnowledgeEntry::new("x", "k", json!(2)).at(now);
        let older = KnowledgeEntry::new("x", "k", json!(1)).at(now - Duration::seconds(5));

        assert!(store.put(newer).await.unwrap());
        assert!(!store.put(older).await.unwrap());
        assert_eq!(store.get("x", "k").await.unwrap().unwrap().value, json!(2));
    }

    #[tokio::test]
    async fn test_merge_order_does_not_matter() {
        let now = Utc::now();
        let writes: Vec<KnowledgeEntry> = (0..5)
            .map(|i| KnowledgeEntry::new("d", "k", json!(i)).at(now + Duration::seconds(i)))
            .collect();

        let forward = InMemoryKnowledgeStore::new();
        for w in writes.iter().cloned() {
            forward.put(w).await.unwrap();
        }
        let backward = InMemoryKnowledgeStore::new();
        for w in writes.iter().rev().cloned() {
            backward.put(w).await.unwrap();
        }

        let a = forward.get("d", "k").await.unwrap().unwrap();
        let b = backward.get("d", "k").await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.value, json!(4));
    }

    #[tokio::test]
    async fn test_equal_timestamps_converge() {
        let now = Utc::now();
        let a = KnowledgeEntry::new("d", "k", json!("from-a")).at(now);
        let b = KnowledgeEntry::new("d", "k", json!("from-b")).at(now);

        let ab = InMemoryKnowledgeStore::new();
        ab.put(a.clone()).await.unwrap();
        ab.put(b.clone()).await.unwrap();
        let ba = InMemoryKnowledgeStore::new();
        ba.put(b).await.unwrap();
        assert!(!ba.put(a).await.unwrap());

        let first = ab.get("d", "k").await.unwrap().unwrap();
        let second = ba.get("d", "k").await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.value, json!("from-b"));
    }

    #[tokio::test]
    async fn test_list_filters_by_domain() {
        let store = InMemoryKnowledgeStore::new();
        store.put(KnowledgeEntry::new("x", "b", json!(1))).await.unwrap();
        store.put(KnowledgeEntry::new("x", "a", json!(2))).await.unwrap();
        store.put(KnowledgeEntry::new("y", "c", json!(3))).await.unwrap();

        let xs = store.list(Some("x")).await.unwrap();
        let keys: Vec<&str> = xs.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.list(None).await.unwrap().len(), 3);
    }
}
