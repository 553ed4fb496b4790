use async_trait::async_trait;
use chrono::{DateTime, Utc};
use maestro_core::{ErrorKind, ExecutorId, SubtaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Lifecycle events emitted by the orchestrator for compliance tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ComplianceEvent {
    /// A task was accepted and decomposed.
    TaskStarted {
        task_id: Uuid,
        task_type: String,
        subtasks: usize,
        timestamp: DateTime<Utc>,
    },
    /// A subtask was handed to an executor.
    SubtaskDispatched {
        task_id: Uuid,
        subtask_id: SubtaskId,
        executor_id: ExecutorId,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    /// A subtask produced output.
    SubtaskCompleted {
        task_id: Uuid,
        subtask_id: SubtaskId,
        executor_id: ExecutorId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A subtask reached a terminal failure.
    SubtaskFailed {
        task_id: Uuid,
        subtask_id: SubtaskId,
        kind: ErrorKind,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// The authorization policy refused an executor for a subtask.
    AuthorizationDenied {
        task_id: Uuid,
        subtask_id: SubtaskId,
        executor_id: ExecutorId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// The compliance policy evaluated a merged result.
    VerdictIssued {
        task_id: Uuid,
        revision: u32,
        approved: bool,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// The task reached Completed or Failed.
    TaskFinished {
        task_id: Uuid,
        status: TaskStatus,
        timestamp: DateTime<Utc>,
    },
}

impl ComplianceEvent {
    pub fn task_id(&self) -> Uuid {
        match self {
            ComplianceEvent::TaskStarted { task_id, .. }
            | ComplianceEvent::SubtaskDispatched { task_id, .. }
            | ComplianceEvent::SubtaskCompleted { task_id, .. }
            | ComplianceEvent::SubtaskFailed { task_id, .. }
            | ComplianceEvent::AuthorizationDenied { task_id, .. }
            | ComplianceEvent::VerdictIssued { task_id, .. }
            | ComplianceEvent::TaskFinished { task_id, .. } => *task_id,
        }
    }

    /// Short event name, matching the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            ComplianceEvent::TaskStarted { .. } => "task_started",
            ComplianceEvent::SubtaskDispatched { .. } => "subtask_dispatched",
            ComplianceEvent::SubtaskCompleted { .. } => "subtask_completed",
            ComplianceEvent::SubtaskFailed { .. } => "subtask_failed",
            ComplianceEvent::AuthorizationDenied { .. } => "authorization_denied",
            ComplianceEvent::VerdictIssued { .. } => "verdict_issued",
            ComplianceEvent::TaskFinished { .. } => "task_finished",
        }
    }
}

/// Trait for receiving compliance-relevant events from the engine.
#[async_trait]
pub trait ComplianceHook: Send + Sync {
    async fn on_event(&self, event: &ComplianceEvent);
}

/// Composite hook that dispatches events to multiple hooks.
pub struct ComplianceHookChain {
    hooks: Vec<Arc<dyn ComplianceHook>>,
}

impl ComplianceHookChain {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook to the chain.
    pub fn add(&mut self, hook: Arc<dyn ComplianceHook>) {
        self.hooks.push(hook);
    }

    /// Emit an event to all hooks in the chain, in registration order.
    pub async fn emit(&self, event: ComplianceEvent) {
        for hook in &self.hooks {
            hook.on_event(&event).await;
        }
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}

impl Default for ComplianceHookChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingHook {
    events: RwLock<Vec<ComplianceEvent>>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ComplianceEvent> {
        self.events.read().await.clone()
    }

    /// Events for one task, in emission order.
    pub async fn events_for(&self, task_id: Uuid) -> Vec<ComplianceEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.task_id() == task_id)
            .cloned()
            .collect()
    }

    pub async fn count(&self, name: &str) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }
}

#[async_trait]
impl ComplianceHook for RecordingHook {
    async fn on_event(&self, event: &ComplianceEvent) {
        self.events.write().await.push(event.clone());
    }
}

/// Emits each event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

#[async_trait]
impl ComplianceHook for TracingHook {
    async fn on_event(&self, event: &ComplianceEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        info!(
            task_id = %event.task_id(),
            event = event.name(),
            payload = %payload,
            "compliance event"
        );
    }
}
