use crate::audit::{AuditLog, AuditOutcome};
use crate::policy::{AllowAll, AuthorizationPolicy};
use maestro_core::{AuthorizationDecision, ExecutorDescriptor, Subtask};
use std::sync::Arc;
use tracing::{debug, warn};

/// Boundary check run before every dispatch.
///
/// The gate holds no state of its own besides the audit trail; re-allocation
/// after a denial is the scheduler's job.
pub struct SecurityGate {
    policy: Arc<dyn AuthorizationPolicy>,
    audit: Arc<AuditLog>,
}

impl SecurityGate {
    pub fn new(policy: Arc<dyn AuthorizationPolicy>, audit: Arc<AuditLog>) -> Self {
        Self { policy, audit }
    }

    /// A gate that allows everything and audits in memory.
    pub fn permissive() -> Self {
        Self::new(Arc::new(AllowAll), Arc::new(AuditLog::in_memory()))
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub async fn authorize(
        &self,
        executor: &ExecutorDescriptor,
        subtask: &Subtask,
    ) -> AuthorizationDecision {
        let decision = self.policy.authorize(executor, subtask).await;

        let (outcome, details) = match &decision {
            AuthorizationDecision::Allow => {
                debug!(executor = %executor.id, subtask = %subtask.id, "authorized");
                (AuditOutcome::Allowed, serde_json::json!({ "kind": executor.kind }))
            }
            AuthorizationDecision::Deny { reason } => {
                warn!(
                    executor = %executor.id,
                    subtask = %subtask.id,
                    reason = %reason,
                    "authorization denied"
                );
                (
                    AuditOutcome::Denied,
                    serde_json::json!({ "kind": executor.kind, "reason": reason }),
                )
            }
        };
        self.audit.log_decision(
            subtask.parent,
            subtask.id.clone(),
            executor.id.clone(),
            details,
            outcome,
        );

        decision
    }
}

impl Default for SecurityGate {
    fn default() -> Self {
        Self::permissive()
    }
}
