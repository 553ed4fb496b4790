use crate::registry::AgentRegistry;
use maestro_core::{ExecutorId, KnowledgeEntry, Subtask};
use maestro_memory::KnowledgeStore;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Publishes successful subtask outputs to the knowledge store and tells
/// subscribed executors about them.
#[derive(Clone)]
pub struct KnowledgePropagator {
    store: Arc<dyn KnowledgeStore>,
    registry: Arc<AgentRegistry>,
}

/// Store key for a subtask's output: `<task id>/<subtask id>`.
pub fn knowledge_key(task_id: Uuid, subtask: &Subtask) -> String {
    format!("{task_id}/{}", subtask.id)
}

impl KnowledgePropagator {
    pub fn new(store: Arc<dyn KnowledgeStore>, registry: Arc<AgentRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    /// Store the output of a succeeded subtask and notify subscribers other
    /// than `producer`. Notifications are fire-and-forget.
    ///
    /// Returns the stored entry, or `None` when nothing was published.
    pub async fn propagate(
        &self,
        task_id: Uuid,
        subtask: &Subtask,
        producer: &ExecutorId,
    ) -> Option<KnowledgeEntry> {
        let output = subtask.output.as_ref()?;
        let entry = KnowledgeEntry::new(
            subtask.required.domain(),
            knowledge_key(task_id, subtask),
            serde_json::Value::String(output.clone()),
        );

        match self.store.put(entry.clone()).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(domain = %entry.domain, key = %entry.key, "newer knowledge already stored");
                return None;
            }
            Err(e) => {
                warn!(
                    task_id = %task_id,
                    subtask = %subtask.id,
                    error = %e,
                    "knowledge propagation skipped"
                );
                return None;
            }
        }

        for (id, handle) in self.registry.subscribers(&entry.domain) {
            if &id == producer {
                continue;
            }
            debug!(domain = %entry.domain, executor = %id, "knowledge notification sent");
            let shared = entry.clone();
            tokio::spawn(async move {
                handle.notify(&shared).await;
            });
        }
        Some(entry)
    }
}
