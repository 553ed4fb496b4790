use crate::capability::CapabilitySet;
use crate::error::ErrorKind;
use crate::executor::ExecutorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Identifier of a subtask, unique within its parent task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubtaskId(String);

impl SubtaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubtaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SubtaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SubtaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Decomposed,
    Executing,
    Synthesizing,
    ComplianceReview,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Decomposed => write!(f, "decomposed"),
            TaskStatus::Executing => write!(f, "executing"),
            TaskStatus::Synthesizing => write!(f, "synthesizing"),
            TaskStatus::ComplianceReview => write!(f, "compliance_review"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle of a subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Allocated,
    Dispatched,
    Succeeded,
    Failed,
    /// Every eligible executor was refused by the authorization policy.
    Denied,
}

impl SubtaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubtaskStatus::Succeeded | SubtaskStatus::Failed | SubtaskStatus::Denied
        )
    }
}

/// A unit of work submitted to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub description: String,
    /// Key into the performance store; tasks of the same type share learned scores.
    pub task_type: String,
    pub status: TaskStatus,
    pub revision_count: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(description: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            task_type: task_type.into(),
            status: TaskStatus::Pending,
            revision_count: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move to `status`, stamping `completed_at` on terminal states.
    pub fn transition(&mut self, status: TaskStatus) {
        self.status = status;
        if status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
    }
}

/// A piece of a decomposed task, scheduled onto one executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub parent: Uuid,
    pub description: String,
    pub required: CapabilitySet,
    pub dependencies: Vec<SubtaskId>,
    pub status: SubtaskStatus,
    pub attempt_count: u32,
    pub assigned_to: Option<ExecutorId>,
    /// Executors the authorization policy refused for this subtask.
    #[serde(default)]
    pub denied_by: BTreeSet<ExecutorId>,
    pub output: Option<String>,
    pub error: Option<SubtaskError>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Why a subtask ended without a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl Subtask {
    pub fn new(
        parent: Uuid,
        id: impl Into<SubtaskId>,
        description: impl Into<String>,
        required: CapabilitySet,
    ) -> Self {
        Self {
            id: id.into(),
            parent,
            description: description.into(),
            required,
            dependencies: Vec::new(),
            status: SubtaskStatus::Pending,
            attempt_count: 0,
            assigned_to: None,
            denied_by: BTreeSet::new(),
            output: None,
            error: None,
            dispatched_at: None,
            finished_at: None,
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<SubtaskId>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn succeed(&mut self, output: String) {
        self.status = SubtaskStatus::Succeeded;
        self.output = Some(output);
        self.error = None;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.status = SubtaskStatus::Failed;
        self.error = Some(SubtaskError {
            kind,
            message: message.into(),
        });
        self.finished_at = Some(Utc::now());
    }

    /// Terminal denial: no executor is left that the policy allows.
    pub fn deny(&mut self, message: impl Into<String>) {
        self.status = SubtaskStatus::Denied;
        self.assigned_to = None;
        self.error = Some(SubtaskError {
            kind: ErrorKind::NoEligibleExecutor,
            message: message.into(),
        });
        self.finished_at = Some(Utc::now());
    }
}
