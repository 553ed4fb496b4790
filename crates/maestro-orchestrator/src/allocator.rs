use crate::executor::BidRequest;
use crate::negotiation::{best_candidate, Negotiator};
use crate::performance::{PerformanceStore, NEUTRAL_PRIOR};
use crate::registry::AgentRegistry;
use maestro_core::{ExecutorId, MaestroError, MaestroResult, Subtask};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Why an executor was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationReason {
    /// Uniform random pick with probability ε.
    Exploration,
    /// Highest learned score.
    Performance,
    /// No history for any candidate; the best bid won.
    Negotiation,
}

/// Result of allocating one subtask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub executor: ExecutorId,
    pub reason: AllocationReason,
    /// Winning bid plan, set only for [`AllocationReason::Negotiation`].
    pub plan: Option<serde_json::Value>,
}

/// Chooses an executor per subtask from learned scores, exploration and
/// negotiation.
pub struct AdaptiveAllocator {
    registry: Arc<AgentRegistry>,
    performance: Arc<PerformanceStore>,
    negotiator: Negotiator,
    epsilon: f64,
    rng: Mutex<StdRng>,
}

impl AdaptiveAllocator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        performance: Arc<PerformanceStore>,
        negotiator: Negotiator,
        epsilon: f64,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            registry,
            performance,
            negotiator,
            epsilon: epsilon.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }

    /// Eligible executors that have not yet denied the subtask, in id order.
    pub fn candidates(&self, subtask: &Subtask) -> BTreeSet<ExecutorId> {
        let mut eligible = self.registry.eligible(&subtask.required);
        eligible.retain(|id| !subtask.denied_by.contains(id));
        eligible
    }

    pub async fn allocate(
        &self,
        task_id: Uuid,
        task_type: &str,
        subtask: &Subtask,
    ) -> MaestroResult<Allocation> {
        let candidates = self.candidates(subtask);
        if candidates.is_empty() {
            return Err(MaestroError::NoEligibleExecutor {
                subtask: subtask.id.clone(),
            });
        }

        let explored = {
            let mut rng = self.rng.lock();
            if rng.gen_bool(self.epsilon) {
                Some(rng.gen_range(0..candidates.len()))
            } else {
                None
            }
        };
        if let Some(index) = explored {
            if let Some(executor) = candidates.iter().nth(index).cloned() {
                debug!(subtask = %subtask.id, executor = %executor, "allocated by exploration");
                return Ok(Allocation {
                    executor,
                    reason: AllocationReason::Exploration,
                    plan: None,
                });
            }
        }

        let scores = self.performance.snapshot(task_type, candidates.iter());
        if scores.iter().any(|(_, score)| score.is_some()) {
            let loads = self.registry.loads(candidates.iter());
            let best = best_candidate(
                scores
                    .iter()
                    .map(|(id, score)| (id, score.unwrap_or(NEUTRAL_PRIOR))),
                &loads,
            )
            .cloned()
            .ok_or_else(|| MaestroError::NoEligibleExecutor {
                subtask: subtask.id.clone(),
            })?;
            debug!(subtask = %subtask.id, executor = %best, "allocated by performance");
            return Ok(Allocation {
                executor: best,
                reason: AllocationReason::Performance,
                plan: None,
            });
        }

        let request = BidRequest {
            task_id,
            task_type: task_type.to_string(),
            subtask: subtask.clone(),
        };
        let bid = self
            .negotiator
            .negotiate(&self.registry, &request, &candidates)
            .await?;
        debug!(
            subtask = %subtask.id,
            executor = %bid.executor_id,
            value = bid.value,
            "allocated by negotiation"
        );
        Ok(Allocation {
            executor: bid.executor_id,
            reason: AllocationReason::Negotiation,
            plan: Some(bid.plan),
        })
    }
}
