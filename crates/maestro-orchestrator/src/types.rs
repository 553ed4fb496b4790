use maestro_core::{
    ErrorKind, ExecutorId, MergedResult, Subtask, SubtaskId, SubtaskStatus, Task, TaskStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Why a task ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    /// Subtasks that caused the failure, in decomposition order. Empty for
    /// task-level causes such as decomposition or compliance.
    pub subtasks: Vec<SubtaskId>,
    pub message: String,
}

/// Final state of a task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task: Task,
    /// All subtasks in decomposition order.
    pub subtasks: Vec<Subtask>,
    /// The approved merged result, when the task completed.
    pub result: Option<MergedResult>,
    pub failure: Option<TaskFailure>,
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        self.task.status == TaskStatus::Completed
    }

    pub fn subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id.as_str() == id)
    }

    /// Executors whose subtasks succeeded, each once.
    pub fn contributors(&self) -> BTreeSet<ExecutorId> {
        self.subtasks
            .iter()
            .filter(|s| s.status == SubtaskStatus::Succeeded)
            .filter_map(|s| s.assigned_to.clone())
            .collect()
    }
}
