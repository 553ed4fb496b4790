use maestro_core::ExecutorId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Counters kept per executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorMetrics {
    pub dispatches: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub denials: u64,
    pub duration_ms: u64,
}

/// Tracks dispatch outcomes for every executor the engine has used.
#[derive(Clone, Default)]
pub struct ExecutorMonitor {
    metrics: Arc<RwLock<BTreeMap<ExecutorId, ExecutorMetrics>>>,
}

impl ExecutorMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update(&self, id: &ExecutorId, f: impl FnOnce(&mut ExecutorMetrics)) {
        let mut metrics = self.metrics.write().await;
        f(metrics.entry(id.clone()).or_default());
    }

    pub async fn record_dispatch(&self, id: &ExecutorId) {
        self.update(id, |m| m.dispatches += 1).await;
    }

    pub async fn record_success(&self, id: &ExecutorId, duration_ms: u64) {
        self.update(id, |m| {
            m.successes += 1;
            m.duration_ms += duration_ms;
        })
        .await;
    }

    /// Record a failed attempt. Timeouts count as failures too.
    pub async fn record_failure(&self, id: &ExecutorId, timed_out: bool, duration_ms: u64) {
        self.update(id, |m| {
            m.failures += 1;
            if timed_out {
                m.timeouts += 1;
            }
            m.duration_ms += duration_ms;
        })
        .await;
    }

    pub async fn record_denial(&self, id: &ExecutorId) {
        self.update(id, |m| m.denials += 1).await;
    }

    pub async fn get(&self, id: &ExecutorId) -> Option<ExecutorMetrics> {
        self.metrics.read().await.get(id).cloned()
    }

    pub async fn snapshot(&self) -> BTreeMap<ExecutorId, ExecutorMetrics> {
        self.metrics.read().await.clone()
    }

    /// Sum over all executors.
    pub async fn aggregate(&self) -> ExecutorMetrics {
        let metrics = self.metrics.read().await;
        let mut total = ExecutorMetrics::default();
        for m in metrics.values() {
            total.dispatches += m.dispatches;
            total.successes += m.successes;
            total.failures += m.failures;
            total.timeouts += m.timeouts;
            total.denials += m.denials;
            total.duration_ms += m.duration_ms;
        }
        total
    }

    pub async fn to_json(&self) -> serde_json::Value {
        let executors = self.snapshot().await;
        let aggregate = self.aggregate().await;
        serde_json::json!({
            "executors": executors,
            "aggregate": aggregate,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters() {
        let monitor = ExecutorMonitor::new();
        let e1 = ExecutorId::from("e1");
        monitor.record_dispatch(&e1).await;
        monitor.record_failure(&e1, true, 50).await;
        monitor.record_dispatch(&e1).await;
        monitor.record_success(&e1, 20).await;
        monitor.record_denial(&"e2".into()).await;

        let m = monitor.get(&e1).await.unwrap();
        assert_eq!(m.dispatches, 2);
        assert_eq!(m.successes, 1);
        assert_eq!(m.failures, 1);
        assert_eq!(m.timeouts, 1);
        assert_eq!(m.duration_ms, 70);

        let total = monitor.aggregate().await;
        assert_eq!(total.denials, 1);
        assert_eq!(total.dispatches, 2);
    }

    #[tokio::test]
    async fn test_to_json() {
        let monitor = ExecutorMonitor::new();
        monitor.record_dispatch(&"e1".into()).await;
        let json = monitor.to_json().await;
        assert!(json["executors"]["e1"].is_object());
        assert_eq!(json["aggregate"]["dispatches"], 1);
    }
}
