use async_trait::async_trait;
use maestro_core::{AuthorizationDecision, ExecutorDescriptor, ExecutorId, ExecutorKind, Subtask};
use serde::{Deserialize, Serialize};

/// External authorization policy consulted before every dispatch.
#[async_trait]
pub trait AuthorizationPolicy: Send + Sync {
    async fn authorize(&self, executor: &ExecutorDescriptor, subtask: &Subtask)
        -> AuthorizationDecision;
}

/// Allows every pair. The default when no policy is configured.
pub struct AllowAll;

#[async_trait]
impl AuthorizationPolicy for AllowAll {
    async fn authorize(
        &self,
        _executor: &ExecutorDescriptor,
        _subtask: &Subtask,
    ) -> AuthorizationDecision {
        AuthorizationDecision::Allow
    }
}

/// A deny rule. Every field that is set must match for the rule to fire;
/// a rule with no fields set denies everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenyRule {
    #[serde(default)]
    pub executor: Option<ExecutorId>,
    /// Fires when the subtask requires this capability.
    #[serde(default)]
    pub capability: Option<String>,
    #[serde(default)]
    pub kind: Option<ExecutorKind>,
    pub reason: String,
}

impl DenyRule {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            executor: None,
            capability: None,
            kind: None,
            reason: reason.into(),
        }
    }

    pub fn for_executor(mut self, id: impl Into<ExecutorId>) -> Self {
        self.executor = Some(id.into());
        self
    }

    pub fn for_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn for_kind(mut self, kind: ExecutorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    fn matches(&self, executor: &ExecutorDescriptor, subtask: &Subtask) -> bool {
        self.executor.as_ref().map_or(true, |id| *id == executor.id)
            && self
                .capability
                .as_deref()
                .map_or(true, |cap| subtask.required.has(cap))
            && self.kind.map_or(true, |kind| kind == executor.kind)
    }
}

/// Static deny-list policy. The first matching rule decides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulePolicy {
    rules: Vec<DenyRule>,
}

impl RulePolicy {
    pub fn new(rules: Vec<DenyRule>) -> Self {
        Self { rules }
    }

    pub fn deny(mut self, rule: DenyRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[async_trait]
impl AuthorizationPolicy for RulePolicy {
    async fn authorize(
        &self,
        executor: &ExecutorDescriptor,
        subtask: &Subtask,
    ) -> AuthorizationDecision {
        match self.rules.iter().find(|r| r.matches(executor, subtask)) {
            Some(rule) => AuthorizationDecision::deny(rule.reason.clone()),
            None => AuthorizationDecision::Allow,
        }
    }
}
