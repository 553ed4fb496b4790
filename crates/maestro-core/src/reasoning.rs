//! Boundaries to the external reasoning capability and to human operators.
//!
//! These traits live in `maestro-core` so that the orchestrator, the CLI and
//! test doubles can share them without depending on each other.

use crate::capability::CapabilitySet;
use crate::error::{MaestroError, MaestroResult};
use crate::task::{Subtask, SubtaskId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One subtask as returned by the reasoning capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskSpec {
    pub id: SubtaskId,
    pub description: String,
    #[serde(default)]
    pub capabilities: CapabilitySet,
    #[serde(default)]
    pub depends_on: Vec<SubtaskId>,
}

impl SubtaskSpec {
    pub fn new(id: impl Into<SubtaskId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            capabilities: CapabilitySet::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn requires<S: Into<String>>(mut self, caps: impl IntoIterator<Item = S>) -> Self {
        self.capabilities = caps.into_iter().collect();
        self
    }

    pub fn after<S: Into<SubtaskId>>(mut self, deps: impl IntoIterator<Item = S>) -> Self {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// A task broken into subtasks. The vector order is the decomposition order,
/// which the synthesizer preserves when merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decomposition {
    pub subtasks: Vec<SubtaskSpec>,
}

impl Decomposition {
    pub fn new(subtasks: Vec<SubtaskSpec>) -> Self {
        Self { subtasks }
    }

    /// Materialize the specs as pending subtasks of `parent`.
    pub fn into_subtasks(self, parent: Uuid) -> Vec<Subtask> {
        self.subtasks
            .into_iter()
            .map(|spec| {
                Subtask::new(parent, spec.id, spec.description, spec.capabilities)
                    .with_dependencies(spec.depends_on)
            })
            .collect()
    }
}

/// The external reasoning capability: splits tasks and, optionally, writes
/// merged content.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Break a task description into an ordered set of subtasks with dependencies.
    async fn decompose(&self, description: &str) -> MaestroResult<Decomposition>;

    /// Produce merged text from subtasks given in decomposition order.
    async fn synthesize_content(&self, ordered: &[Subtask]) -> MaestroResult<String> {
        let _ = ordered;
        Err(MaestroError::Synthesis(
            "reasoning provider does not support content synthesis".into(),
        ))
    }
}

/// A human-in-the-loop interface. Implementations can be CLI prompts,
/// WebSocket handlers, ticket queues, etc.
#[async_trait]
pub trait HumanInterface: Send + Sync {
    /// Ask a human to complete `subtask`, waiting at most `timeout`.
    async fn request_input(&self, subtask: &Subtask, timeout: Duration) -> MaestroResult<String>;
}
