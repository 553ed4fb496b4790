use async_trait::async_trait;
use maestro_core::{
    Bid, ExecutorId, HumanInterface, KnowledgeEntry, MaestroResult, Subtask, SubtaskId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Sent to every eligible executor during a negotiation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRequest {
    pub task_id: Uuid,
    pub task_type: String,
    pub subtask: Subtask,
}

/// Everything an executor gets alongside the subtask on dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub task_id: Uuid,
    pub task_description: String,
    pub task_type: String,
    /// Outputs of the subtask's dependencies, all of which succeeded.
    pub dependency_outputs: BTreeMap<SubtaskId, String>,
    /// Plan from the winning bid, when negotiation chose this executor.
    pub plan: Option<serde_json::Value>,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// An automated agent or human adapter that can run subtasks.
///
/// Only `execute` is required. Executors that never bid are simply left out
/// of negotiation rounds.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Answer a bid request. `None` declines the round.
    async fn bid(&self, request: &BidRequest) -> Option<Bid> {
        let _ = request;
        None
    }

    /// Run the subtask and return its output.
    async fn execute(&self, subtask: &Subtask, ctx: &ExecutionContext) -> MaestroResult<String>;

    /// Best-effort request to stop work on a subtask.
    async fn abort(&self, subtask: &SubtaskId) {
        let _ = subtask;
    }

    /// A knowledge entry was published in a subscribed domain.
    async fn notify(&self, entry: &KnowledgeEntry) {
        let _ = entry;
    }
}

/// Wraps a [`HumanInterface`] so a person can be registered as an executor.
pub struct HumanExecutor {
    id: ExecutorId,
    interface: Arc<dyn HumanInterface>,
    timeout: Duration,
    bid_value: Option<f64>,
}

impl HumanExecutor {
    pub fn new(
        id: impl Into<ExecutorId>,
        interface: Arc<dyn HumanInterface>,
        timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            interface,
            timeout,
            bid_value: None,
        }
    }

    /// Make the human take part in negotiation with a fixed bid.
    pub fn with_bid(mut self, value: f64) -> Self {
        self.bid_value = Some(value);
        self
    }

    pub fn id(&self) -> &ExecutorId {
        &self.id
    }
}

#[async_trait]
impl Executor for HumanExecutor {
    async fn bid(&self, request: &BidRequest) -> Option<Bid> {
        self.bid_value
            .map(|value| Bid::new(request.subtask.id.clone(), self.id.clone(), value))
    }

    async fn execute(&self, subtask: &Subtask, _ctx: &ExecutionContext) -> MaestroResult<String> {
        self.interface.request_input(subtask, self.timeout).await
    }
}
