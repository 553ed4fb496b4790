use crate::hooks::{ComplianceEvent, ComplianceHookChain};
use crate::policy::CompliancePolicy;
use chrono::Utc;
use maestro_core::{
    ComplianceVerdict, MaestroError, MaestroResult, MergedResult, RevisionRequest, Task,
    TaskStatus,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Evaluates merged results and drives the bounded revision loop.
///
/// A rejected result is re-synthesized at most `max_revisions` times; the
/// loop is a plain counter over `Task::revision_count`, so it always ends.
#[derive(Clone)]
pub struct ComplianceGate {
    policy: Arc<dyn CompliancePolicy>,
    max_revisions: u32,
    hooks: Arc<ComplianceHookChain>,
}

impl ComplianceGate {
    pub fn new(policy: Arc<dyn CompliancePolicy>, max_revisions: u32) -> Self {
        Self {
            policy,
            max_revisions,
            hooks: Arc::new(ComplianceHookChain::new()),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<ComplianceHookChain>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn max_revisions(&self) -> u32 {
        self.max_revisions
    }

    /// Evaluate a single merged result and report the verdict to the hooks.
    pub async fn evaluate(&self, result: &MergedResult) -> ComplianceVerdict {
        let verdict = self.policy.evaluate(result).await;
        let reason = match &verdict {
            ComplianceVerdict::Approved => None,
            ComplianceVerdict::Rejected { reason } => Some(reason.clone()),
        };
        self.hooks
            .emit(ComplianceEvent::VerdictIssued {
                task_id: result.task_id,
                revision: result.revision,
                approved: reason.is_none(),
                reason,
                timestamp: Utc::now(),
            })
            .await;
        verdict
    }

    /// Review `initial`, calling `revise` after each rejection until the
    /// policy approves or the revision budget is spent.
    ///
    /// Moves `task` between `ComplianceReview` and `Synthesizing` and bumps
    /// `revision_count` per revision. The final Completed/Failed transition
    /// is left to the caller.
    pub async fn review<F, Fut>(
        &self,
        task: &mut Task,
        initial: MergedResult,
        mut revise: F,
    ) -> MaestroResult<MergedResult>
    where
        F: FnMut(RevisionRequest) -> Fut,
        Fut: Future<Output = MaestroResult<MergedResult>>,
    {
        let mut current = initial;
        loop {
            task.transition(TaskStatus::ComplianceReview);
            match self.evaluate(&current).await {
                ComplianceVerdict::Approved => {
                    info!(task_id = %task.id, revision = current.revision, "compliance approved");
                    return Ok(current);
                }
                ComplianceVerdict::Rejected { reason } => {
                    if task.revision_count >= self.max_revisions {
                        warn!(
                            task_id = %task.id,
                            revisions = task.revision_count,
                            reason = %reason,
                            "compliance rejected, revision budget exhausted"
                        );
                        return Err(MaestroError::ComplianceRejected {
                            reason,
                            revisions: task.revision_count,
                        });
                    }
                    task.revision_count += 1;
                    warn!(
                        task_id = %task.id,
                        revision = task.revision_count,
                        reason = %reason,
                        "compliance rejected, re-synthesizing"
                    );
                    task.transition(TaskStatus::Synthesizing);
                    current = revise(RevisionRequest {
                        revision: task.revision_count,
                        reason,
                        prior: current,
                    })
                    .await?;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::policy::ApproveAll;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Rejects the first `n` evaluations.
    struct RejectFirst {
        remaining: AtomicU32,
    }

    #[async_trait]
    impl CompliancePolicy for RejectFirst {
        async fn evaluate(&self, _result: &MergedResult) -> ComplianceVerdict {
            let left = self.remaining.load(Ordering::SeqCst);
            if left > 0 {
                self.remaining.store(left - 1, Ordering::SeqCst);
                ComplianceVerdict::reject(format!("left {left}"))
            } else {
                ComplianceVerdict::Approved
            }
        }
    }

    fn merged(task: &Task) -> MergedResult {
        MergedResult {
            task_id: task.id,
            content: "draft".into(),
            contributors: vec![],
            gaps: vec![],
            revision: 0,
            feedback: vec![],
        }
    }

    async fn resynthesize(req: RevisionRequest) -> MaestroResult<MergedResult> {
        let mut next = req.prior;
        next.revision = req.revision;
        next.feedback.push(req.reason);
        Ok(next)
    }

    #[tokio::test]
    async fn test_approve_all_needs_no_revision() {
        let gate = ComplianceGate::new(Arc::new(ApproveAll), 3);
        let mut task = Task::new("t", "report");
        let initial = merged(&task);
        let result = gate.review(&mut task, initial, resynthesize).await.unwrap();
        assert_eq!(result.revision, 0);
        assert_eq!(task.revision_count, 0);
        assert_eq!(task.status, TaskStatus::ComplianceReview);
    }

    #[tokio::test]
    async fn test_rejections_within_budget() {
        let policy = RejectFirst {
            remaining: AtomicU32::new(2),
        };
        let gate = ComplianceGate::new(Arc::new(policy), 3);
        let mut task = Task::new("t", "report");
        let initial = merged(&task);
        let result = gate.review(&mut task, initial, resynthesize).await.unwrap();
        assert_eq!(task.revision_count, 2);
        assert_eq!(result.revision, 2);
        assert_eq!(result.feedback, vec!["left 2", "left 1"]);
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let policy = RejectFirst {
            remaining: AtomicU32::new(u32::MAX),
        };
        let gate = ComplianceGate::new(Arc::new(policy), 2);
        let mut task = Task::new("t", "report");
        let initial = merged(&task);

        let calls = AtomicU32::new(0);
        let err = gate
            .review(&mut task, initial, |req| {
                calls.fetch_add(1, Ordering::SeqCst);
                resynthesize(req)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MaestroError::ComplianceRejected { revisions: 2, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(task.revision_count, 2);
    }

    #[tokio::test]
    async fn test_zero_budget_fails_on_first_rejection() {
        let policy = RejectFirst {
            remaining: AtomicU32::new(1),
        };
        let gate = ComplianceGate::new(Arc::new(policy), 0);
        let mut task = Task::new("t", "report");
        let initial = merged(&task);
        let err = gate
            .review(&mut task, initial, resynthesize)
            .await
            .unwrap_err();
        assert!(matches!(err, MaestroError::ComplianceRejected { revisions: 0, .. }));
    }

    #[tokio::test]
    async fn test_revise_error_propagates() {
        let policy = RejectFirst {
            remaining: AtomicU32::new(1),
        };
        let gate = ComplianceGate::new(Arc::new(policy), 3);
        let mut task = Task::new("t", "report");
        let initial = merged(&task);
        let err = gate
            .review(&mut task, initial, |_req| async {
                Err(MaestroError::Synthesis("merge broke".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MaestroError::Synthesis(_)));
    }
}
