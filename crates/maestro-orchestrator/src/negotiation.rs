use crate::executor::BidRequest;
use crate::registry::AgentRegistry;
use maestro_core::{Bid, ExecutorId, MaestroError, MaestroResult};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Pick the highest score; ties go to the lowest load, then the smallest id.
pub fn best_candidate<'a>(
    candidates: impl IntoIterator<Item = (&'a ExecutorId, f64)>,
    loads: &HashMap<ExecutorId, usize>,
) -> Option<&'a ExecutorId> {
    let load = |id: &ExecutorId| loads.get(id).copied().unwrap_or(0);
    candidates
        .into_iter()
        .min_by(|(a_id, a_score), (b_id, b_score)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| load(a_id).cmp(&load(b_id)))
                .then_with(|| a_id.cmp(b_id))
        })
        .map(|(id, _)| id)
}

/// Runs bidding rounds among eligible executors.
#[derive(Debug, Clone)]
pub struct Negotiator {
    window: Duration,
}

impl Negotiator {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Ask every executor in `eligible` for a bid and return the winner.
    ///
    /// Bids arriving after the window closes are ignored, as are bids for a
    /// different subtask, from executors outside `eligible`, or with a
    /// non-finite value. Values are clamped into `[0, 1]`.
    pub async fn negotiate(
        &self,
        registry: &AgentRegistry,
        request: &BidRequest,
        eligible: &BTreeSet<ExecutorId>,
    ) -> MaestroResult<Bid> {
        let subtask = request.subtask.id.clone();
        let deadline = Instant::now() + self.window;
        let (tx, mut rx) = mpsc::channel::<(ExecutorId, Option<Bid>)>(eligible.len().max(1));

        // Dropping the set aborts bidders still running past the deadline.
        let mut bidders = JoinSet::new();
        for id in eligible {
            let Some(handle) = registry.handle(id) else {
                continue;
            };
            let tx = tx.clone();
            let id = id.clone();
            let request = request.clone();
            bidders.spawn(async move {
                let bid = handle.bid(&request).await;
                let _ = tx.send((id, bid)).await;
            });
        }
        drop(tx);

        let mut bids: Vec<Bid> = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some((from, Some(mut bid)))) => {
                    if bid.subtask_id != subtask
                        || bid.executor_id != from
                        || !eligible.contains(&bid.executor_id)
                        || !bid.value.is_finite()
                    {
                        warn!(subtask = %subtask, executor = %from, "discarding malformed bid");
                        continue;
                    }
                    bid.value = bid.value.clamp(0.0, 1.0);
                    debug!(subtask = %subtask, executor = %from, value = bid.value, "bid received");
                    bids.push(bid);
                }
                Ok(Some((from, None))) => {
                    debug!(subtask = %subtask, executor = %from, "executor declined to bid");
                }
                Ok(None) => break,
                Err(_) => {
                    debug!(subtask = %subtask, "negotiation window closed");
                    break;
                }
            }
        }
        bidders.abort_all();

        let loads = registry.loads(bids.iter().map(|b| &b.executor_id));
        let winner = best_candidate(bids.iter().map(|b| (&b.executor_id, b.value)), &loads)
            .cloned()
            .ok_or_else(|| MaestroError::NoEligibleExecutor {
                subtask: subtask.clone(),
            })?;
        bids.into_iter()
            .find(|b| b.executor_id == winner)
            .ok_or(MaestroError::NoEligibleExecutor { subtask })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::executor::{ExecutionContext, Executor};
    use async_trait::async_trait;
    use maestro_core::{CapabilitySet, ExecutorDescriptor, Subtask};
    use std::sync::Arc;
    use uuid::Uuid;

    enum Behaviour {
        Value(f64),
        Slow(f64, Duration),
        Decline,
        WrongSubtask,
        Impersonate(&'static str),
    }

    struct Bidder {
        id: ExecutorId,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl Executor for Bidder {
        async fn bid(&self, request: &BidRequest) -> Option<Bid> {
            let subtask = request.subtask.id.clone();
            match &self.behaviour {
                Behaviour::Value(v) => Some(Bid::new(subtask, self.id.clone(), *v)),
                Behaviour::Slow(v, delay) => {
                    tokio::time::sleep(*delay).await;
                    Some(Bid::new(subtask, self.id.clone(), *v))
                }
                Behaviour::Decline => None,
                Behaviour::WrongSubtask => Some(Bid::new("other".into(), self.id.clone(), 1.0)),
                Behaviour::Impersonate(other) => Some(Bid::new(subtask, (*other).into(), 1.0)),
            }
        }

        async fn execute(
            &self,
            _subtask: &Subtask,
            _ctx: &ExecutionContext,
        ) -> MaestroResult<String> {
            Ok(String::new())
        }
    }

    fn setup(bidders: Vec<(&str, Behaviour)>) -> (AgentRegistry, BTreeSet<ExecutorId>) {
        let registry = AgentRegistry::new();
        let mut ids = BTreeSet::new();
        for (id, behaviour) in bidders {
            let id = ExecutorId::from(id);
            registry
                .register(
                    ExecutorDescriptor::automated(id.clone(), CapabilitySet::new()),
                    Arc::new(Bidder {
                        id: id.clone(),
                        behaviour,
                    }),
                )
                .unwrap();
            ids.insert(id);
        }
        (registry, ids)
    }

    fn request() -> BidRequest {
        BidRequest {
            task_id: Uuid::new_v4(),
            task_type: "t".into(),
            subtask: Subtask::new(Uuid::new_v4(), "a", "work", CapabilitySet::new()),
        }
    }

    #[tokio::test]
    async fn test_highest_bid_wins() {
        let (registry, ids) = setup(vec![
            ("e1", Behaviour::Value(0.4)),
            ("e2", Behaviour::Value(0.9)),
            ("e3", Behaviour::Decline),
        ]);
        let bid = Negotiator::new(Duration::from_secs(1))
            .negotiate(&registry, &request(), &ids)
            .await
            .unwrap();
        assert_eq!(bid.executor_id.as_str(), "e2");
    }

    #[tokio::test]
    async fn test_tie_breaks_on_load_then_id() {
        let (registry, ids) = setup(vec![
            ("e1", Behaviour::Value(0.5)),
            ("e2", Behaviour::Value(0.5)),
            ("e3", Behaviour::Value(0.5)),
        ]);
        let negotiator = Negotiator::new(Duration::from_secs(1));
        let bid = negotiator.negotiate(&registry, &request(), &ids).await.unwrap();
        assert_eq!(bid.executor_id.as_str(), "e1");

        let _busy = registry.acquire(&"e1".into()).unwrap();
        let bid = negotiator.negotiate(&registry, &request(), &ids).await.unwrap();
        assert_eq!(bid.executor_id.as_str(), "e2");
    }

    #[tokio::test]
    async fn test_late_and_malformed_bids_excluded() {
        let (registry, ids) = setup(vec![
            ("late", Behaviour::Slow(1.0, Duration::from_millis(500))),
            ("liar", Behaviour::Impersonate("late")),
            ("lost", Behaviour::WrongSubtask),
            ("nan", Behaviour::Value(f64::NAN)),
            ("ok", Behaviour::Value(0.2)),
        ]);
        let bid = Negotiator::new(Duration::from_millis(50))
            .negotiate(&registry, &request(), &ids)
            .await
            .unwrap();
        assert_eq!(bid.executor_id.as_str(), "ok");
    }

    #[tokio::test]
    async fn test_values_are_clamped() {
        let (registry, ids) = setup(vec![("big", Behaviour::Value(7.0))]);
        let bid = Negotiator::new(Duration::from_secs(1))
            .negotiate(&registry, &request(), &ids)
            .await
            .unwrap();
        assert_eq!(bid.value, 1.0);
    }

    #[tokio::test]
    async fn test_no_bids_is_no_eligible_executor() {
        let (registry, ids) = setup(vec![("e1", Behaviour::Decline)]);
        let err = Negotiator::new(Duration::from_millis(50))
            .negotiate(&registry, &request(), &ids)
            .await
            .unwrap_err();
        assert!(matches!(err, MaestroError::NoEligibleExecutor { .. }));
    }

    #[test]
    fn test_best_candidate_ordering() {
        let ids: Vec<ExecutorId> = ["b", "a", "c"].iter().map(|s| ExecutorId::from(*s)).collect();
        let mut loads = HashMap::new();
        loads.insert(ExecutorId::from("a"), 3);
        let picked = best_candidate(ids.iter().map(|id| (id, 0.7)), &loads).unwrap();
        assert_eq!(picked.as_str(), "b");
        assert!(best_candidate(std::iter::empty(), &loads).is_none());
    }
}
