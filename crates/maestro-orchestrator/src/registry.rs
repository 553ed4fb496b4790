use crate::executor::Executor;
use maestro_core::{CapabilitySet, ExecutorDescriptor, ExecutorId, MaestroError, MaestroResult};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::info;

struct Entry {
    descriptor: ExecutorDescriptor,
    handle: Arc<dyn Executor>,
}

type Entries = Arc<RwLock<HashMap<ExecutorId, Entry>>>;

/// Process-scoped table of registered executors.
///
/// All mutation goes through the write lock; readers get cloned descriptors.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    entries: Entries,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor. Ids are unique; the descriptor's load is reset.
    pub fn register(
        &self,
        mut descriptor: ExecutorDescriptor,
        handle: Arc<dyn Executor>,
    ) -> MaestroResult<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&descriptor.id) {
            return Err(MaestroError::Registry(format!(
                "executor {} is already registered",
                descriptor.id
            )));
        }
        descriptor.load = 0;
        info!(
            executor = %descriptor.id,
            kind = %descriptor.kind,
            capabilities = %descriptor.capabilities,
            "executor registered"
        );
        entries.insert(descriptor.id.clone(), Entry { descriptor, handle });
        Ok(())
    }

    /// Executors whose capabilities cover `required`, in id order.
    pub fn eligible(&self, required: &CapabilitySet) -> BTreeSet<ExecutorId> {
        self.entries
            .read()
            .values()
            .filter(|e| e.descriptor.is_eligible_for(required))
            .map(|e| e.descriptor.id.clone())
            .collect()
    }

    /// Current in-flight count; 0 for unknown executors.
    pub fn load(&self, id: &ExecutorId) -> usize {
        self.entries
            .read()
            .get(id)
            .map_or(0, |e| e.descriptor.load)
    }

    /// Loads of several executors read under one lock.
    pub fn loads<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a ExecutorId>,
    ) -> HashMap<ExecutorId, usize> {
        let entries = self.entries.read();
        ids.into_iter()
            .map(|id| (id.clone(), entries.get(id).map_or(0, |e| e.descriptor.load)))
            .collect()
    }

    /// Count a dispatch against `id` until the returned guard is dropped.
    pub fn acquire(&self, id: &ExecutorId) -> Option<LoadGuard> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(id)?;
        entry.descriptor.load += 1;
        Some(LoadGuard {
            entries: self.entries.clone(),
            id: id.clone(),
        })
    }

    pub fn subscribe(&self, id: &ExecutorId, domain: impl Into<String>) -> MaestroResult<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| MaestroError::Registry(format!("unknown executor {id}")))?;
        entry.descriptor.subscriptions.insert(domain.into());
        Ok(())
    }

    /// Executors subscribed to `domain`, with their handles, in id order.
    pub fn subscribers(&self, domain: &str) -> Vec<(ExecutorId, Arc<dyn Executor>)> {
        let entries = self.entries.read();
        let mut subs: Vec<(ExecutorId, Arc<dyn Executor>)> = entries
            .values()
            .filter(|e| e.descriptor.subscriptions.contains(domain))
            .map(|e| (e.descriptor.id.clone(), e.handle.clone()))
            .collect();
        subs.sort_by(|a, b| a.0.cmp(&b.0));
        subs
    }

    pub fn descriptor(&self, id: &ExecutorId) -> Option<ExecutorDescriptor> {
        self.entries.read().get(id).map(|e| e.descriptor.clone())
    }

    pub fn handle(&self, id: &ExecutorId) -> Option<Arc<dyn Executor>> {
        self.entries.read().get(id).map(|e| e.handle.clone())
    }

    /// All descriptors, in id order.
    pub fn snapshot(&self) -> Vec<ExecutorDescriptor> {
        let mut all: Vec<ExecutorDescriptor> = self
            .entries
            .read()
            .values()
            .map(|e| e.descriptor.clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Decrements an executor's load when dropped.
pub struct LoadGuard {
    entries: Entries,
    id: ExecutorId,
}

impl LoadGuard {
    pub fn executor(&self) -> &ExecutorId {
        &self.id
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if let Some(entry) = self.entries.write().get_mut(&self.id) {
            entry.descriptor.load = entry.descriptor.load.saturating_sub(1);
        }
    }
}
