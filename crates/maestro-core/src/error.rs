use crate::executor::ExecutorId;
use crate::task::SubtaskId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A convenience `Result` alias using [`MaestroError`].
pub type MaestroResult<T> = Result<T, MaestroError>;

/// Top-level error type for the orchestration engine.
///
/// Subtask-level variants (`NoEligibleExecutor`, `AuthorizationDenied`,
/// `SubtaskTimeout`, `SubtaskExecution`) are recovered locally by the
/// scheduler where possible; task-level variants end the task.
#[derive(Error, Debug)]
pub enum MaestroError {
    /// The reasoning capability failed or returned an invalid subtask graph.
    #[error("Decomposition error: {0}")]
    Decomposition(String),

    /// No registered executor can (or may) run the subtask.
    #[error("No eligible executor for subtask {subtask}")]
    NoEligibleExecutor {
        /// The subtask that could not be placed.
        subtask: SubtaskId,
    },

    /// The authorization policy refused an (executor, subtask) pair.
    #[error("Executor {executor} denied for subtask {subtask}: {reason}")]
    AuthorizationDenied {
        /// Executor that was refused.
        executor: ExecutorId,
        /// Subtask it was refused for.
        subtask: SubtaskId,
        /// Policy-supplied reason.
        reason: String,
    },

    /// The executor did not answer within the subtask timeout.
    #[error("Subtask {subtask} timed out after {after:?}")]
    SubtaskTimeout {
        /// The subtask that timed out.
        subtask: SubtaskId,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The executor reported a failure.
    #[error("Subtask {subtask} failed: {message}")]
    SubtaskExecution {
        /// The failing subtask.
        subtask: SubtaskId,
        /// Executor-supplied message.
        message: String,
    },

    /// Merging subtask outputs failed.
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// The compliance policy kept rejecting the merged result.
    #[error("Compliance rejected after {revisions} revisions: {reason}")]
    ComplianceRejected {
        /// Reason from the last rejection.
        reason: String,
        /// Number of revisions performed before giving up.
        revisions: u32,
    },

    /// The knowledge store could not be reached.
    #[error("Knowledge store unavailable: {0}")]
    KnowledgeStoreUnavailable(String),

    /// Executor registration problems.
    #[error("Registry error: {0}")]
    Registry(String),

    /// An observed-quality score outside `[0, 1]`.
    #[error("Invalid feedback score: {0}")]
    InvalidFeedback(f64),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// The task was cancelled by its caller.
    #[error("Task cancelled")]
    Cancelled,

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MaestroError {
    /// The serializable kind of this error, used in task failure reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MaestroError::Decomposition(_) => ErrorKind::Decomposition,
            MaestroError::NoEligibleExecutor { .. } => ErrorKind::NoEligibleExecutor,
            MaestroError::AuthorizationDenied { .. } => ErrorKind::AuthorizationDenied,
            MaestroError::SubtaskTimeout { .. } => ErrorKind::SubtaskTimeout,
            MaestroError::SubtaskExecution { .. } => ErrorKind::SubtaskExecution,
            MaestroError::Synthesis(_) => ErrorKind::Synthesis,
            MaestroError::ComplianceRejected { .. } => ErrorKind::ComplianceRejected,
            MaestroError::KnowledgeStoreUnavailable(_) => ErrorKind::KnowledgeStoreUnavailable,
            MaestroError::Cancelled => ErrorKind::Cancelled,
            MaestroError::Registry(_)
            | MaestroError::InvalidFeedback(_)
            | MaestroError::Config(_)
            | MaestroError::Json(_)
            | MaestroError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether the scheduler should retry the dispatch that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MaestroError::SubtaskTimeout { .. } | MaestroError::SubtaskExecution { .. }
        )
    }
}

/// Error kind recorded on failed tasks and subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decomposition,
    NoEligibleExecutor,
    AuthorizationDenied,
    SubtaskTimeout,
    SubtaskExecution,
    /// A dependency failed, so the subtask never ran.
    DependencyFailed,
    Synthesis,
    ComplianceRejected,
    KnowledgeStoreUnavailable,
    Cancelled,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Decomposition => "decomposition",
            ErrorKind::NoEligibleExecutor => "no_eligible_executor",
            ErrorKind::AuthorizationDenied => "authorization_denied",
            ErrorKind::SubtaskTimeout => "subtask_timeout",
            ErrorKind::SubtaskExecution => "subtask_execution",
            ErrorKind::DependencyFailed => "dependency_failed",
            ErrorKind::Synthesis => "synthesis",
            ErrorKind::ComplianceRejected => "compliance_rejected",
            ErrorKind::KnowledgeStoreUnavailable => "knowledge_store_unavailable",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}
