use crate::task::{SubtaskId, SubtaskStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of an authorization check for an (executor, subtask) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum AuthorizationDecision {
    Allow,
    Deny { reason: String },
}

impl AuthorizationDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthorizationDecision::Allow)
    }
}

/// Outcome of a compliance evaluation of a merged result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum ComplianceVerdict {
    Approved,
    Rejected { reason: String },
}

impl ComplianceVerdict {
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ComplianceVerdict::Approved)
    }
}

/// A subtask that contributed no output to a merged result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub subtask_id: SubtaskId,
    pub status: SubtaskStatus,
    pub reason: String,
}

/// The merged output of a task's subtasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedResult {
    pub task_id: Uuid,
    pub content: String,
    /// Subtasks whose output was merged, in decomposition order.
    pub contributors: Vec<SubtaskId>,
    /// Subtasks without output, in decomposition order.
    pub gaps: Vec<Gap>,
    /// 0 for the first synthesis, incremented on every compliance revision.
    pub revision: u32,
    /// Rejection reasons fed back into each revision, oldest first.
    #[serde(default)]
    pub feedback: Vec<String>,
}

impl MergedResult {
    /// A result with gaps is degraded: some subtasks are missing.
    pub fn is_degraded(&self) -> bool {
        !self.gaps.is_empty()
    }

    pub fn missing(&self) -> Vec<&SubtaskId> {
        self.gaps.iter().map(|g| &g.subtask_id).collect()
    }
}

/// Input to a re-synthesis after a compliance rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionRequest {
    /// The revision number being produced (1 for the first revision).
    pub revision: u32,
    pub reason: String,
    pub prior: MergedResult,
}
