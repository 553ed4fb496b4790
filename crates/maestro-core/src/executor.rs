use crate::capability::CapabilitySet;
use crate::task::SubtaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier of a registered executor. Ordered lexicographically, which is
/// the final tie-break during allocation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutorId(String);

impl ExecutorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExecutorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ExecutorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether an executor is an automated agent or a human-in-the-loop interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    Automated,
    Human,
}

impl std::fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorKind::Automated => write!(f, "automated"),
            ExecutorKind::Human => write!(f, "human"),
        }
    }
}

/// Static description of an executor plus its current load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorDescriptor {
    pub id: ExecutorId,
    pub capabilities: CapabilitySet,
    pub kind: ExecutorKind,
    /// In-flight subtasks. Maintained by the registry, ignored on registration.
    #[serde(default)]
    pub load: usize,
    /// Knowledge domains this executor wants to be notified about.
    #[serde(default)]
    pub subscriptions: BTreeSet<String>,
}

impl ExecutorDescriptor {
    pub fn new(id: impl Into<ExecutorId>, kind: ExecutorKind, capabilities: CapabilitySet) -> Self {
        Self {
            id: id.into(),
            capabilities,
            kind,
            load: 0,
            subscriptions: BTreeSet::new(),
        }
    }

    pub fn automated(id: impl Into<ExecutorId>, capabilities: CapabilitySet) -> Self {
        Self::new(id, ExecutorKind::Automated, capabilities)
    }

    pub fn human(id: impl Into<ExecutorId>, capabilities: CapabilitySet) -> Self {
        Self::new(id, ExecutorKind::Human, capabilities)
    }

    pub fn with_subscription(mut self, domain: impl Into<String>) -> Self {
        self.subscriptions.insert(domain.into());
        self
    }

    pub fn is_eligible_for(&self, required: &CapabilitySet) -> bool {
        self.capabilities.satisfies(required)
    }
}

/// An executor's self-estimated suitability for a subtask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub subtask_id: SubtaskId,
    pub executor_id: ExecutorId,
    /// Suitability in `[0, 1]`.
    pub value: f64,
    /// Opaque plan proposed by the executor, handed back to it on dispatch.
    #[serde(default)]
    pub plan: serde_json::Value,
    pub submitted_at: DateTime<Utc>,
}

impl Bid {
    pub fn new(subtask_id: SubtaskId, executor_id: ExecutorId, value: f64) -> Self {
        Self {
            subtask_id,
            executor_id,
            value,
            plan: serde_json::Value::Null,
            submitted_at: Utc::now(),
        }
    }

    pub fn with_plan(mut self, plan: serde_json::Value) -> Self {
        self.plan = plan;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_ordering_is_lexicographic() {
        let mut ids = vec![ExecutorId::from("e2"), ExecutorId::from("e10"), ExecutorId::from("e1")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "e1");
        assert_eq!(ids[1].as_str(), "e10");
        assert_eq!(ids[2].as_str(), "e2");
    }

    #[test]
    fn test_descriptor_eligibility() {
        let desc = ExecutorDescriptor::automated("e2", ["x", "y"].into_iter().collect());
        assert!(desc.is_eligible_for(&["x"].into_iter().collect()));
        assert!(!desc.is_eligible_for(&["z"].into_iter().collect()));
        assert_eq!(desc.kind.to_string(), "automated");
    }
}
