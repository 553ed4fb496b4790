use async_trait::async_trait;
use maestro_core::{ComplianceVerdict, MergedResult};
use std::sync::Arc;

/// External compliance policy consulted on every merged result.
#[async_trait]
pub trait CompliancePolicy: Send + Sync {
    async fn evaluate(&self, result: &MergedResult) -> ComplianceVerdict;
}

/// Approves everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAll;

#[async_trait]
impl CompliancePolicy for ApproveAll {
    async fn evaluate(&self, _result: &MergedResult) -> ComplianceVerdict {
        ComplianceVerdict::Approved
    }
}

/// Rejects results whose content mentions any of a list of terms
/// (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct ForbiddenTermsPolicy {
    terms: Vec<String>,
}

impl ForbiddenTermsPolicy {
    pub fn new<S: Into<String>>(terms: impl IntoIterator<Item = S>) -> Self {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.into().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl CompliancePolicy for ForbiddenTermsPolicy {
    async fn evaluate(&self, result: &MergedResult) -> ComplianceVerdict {
        let content = result.content.to_lowercase();
        let found: Vec<&str> = self
            .terms
            .iter()
            .filter(|t| content.contains(t.as_str()))
            .map(String::as_str)
            .collect();
        if found.is_empty() {
            ComplianceVerdict::Approved
        } else {
            ComplianceVerdict::reject(format!("forbidden terms present: {}", found.join(", ")))
        }
    }
}

/// Rejects degraded results, i.e. results with at least one gap.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireCompletePolicy;

#[async_trait]
impl CompliancePolicy for RequireCompletePolicy {
    async fn evaluate(&self, result: &MergedResult) -> ComplianceVerdict {
        if result.is_degraded() {
            let missing: Vec<&str> = result.missing().iter().map(|id| id.as_str()).collect();
            ComplianceVerdict::reject(format!("missing subtasks: {}", missing.join(", ")))
        } else {
            ComplianceVerdict::Approved
        }
    }
}

/// Runs policies in order; the first rejection wins.
#[derive(Default, Clone)]
pub struct PolicyChain {
    policies: Vec<Arc<dyn CompliancePolicy>>,
}

impl PolicyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, policy: Arc<dyn CompliancePolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[async_trait]
impl CompliancePolicy for PolicyChain {
    async fn evaluate(&self, result: &MergedResult) -> ComplianceVerdict {
        for policy in &self.policies {
            let verdict = policy.evaluate(result).await;
            if !verdict.is_approved() {
                return verdict;
            }
        }
        ComplianceVerdict::Approved
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use maestro_core::{Gap, SubtaskId, SubtaskStatus};
    use uuid::Uuid;

    fn result(content: &str, gaps: Vec<Gap>) -> MergedResult {
        MergedResult {
            task_id: Uuid::new_v4(),
            content: content.into(),
            contributors: vec![SubtaskId::from("a")],
            gaps,
            revision: 0,
            feedback: vec![],
        }
    }

    #[tokio::test]
    async fn test_forbidden_terms_case_insensitive() {
        let policy = ForbiddenTermsPolicy::new(["SSN", "password"]);
        let verdict = policy.evaluate(&result("the Password is hunter2", vec![])).await;
        assert_eq!(
            verdict,
            ComplianceVerdict::reject("forbidden terms present: password")
        );
        assert!(policy.evaluate(&result("all clear", vec![])).await.is_approved());
    }

    #[tokio::test]
    async fn test_require_complete_rejects_gaps() {
        let gap = Gap {
            subtask_id: SubtaskId::from("z"),
            status: SubtaskStatus::Denied,
            reason: "no eligible executor".into(),
        };
        let verdict = RequireCompletePolicy.evaluate(&result("x", vec![gap])).await;
        assert_eq!(verdict, ComplianceVerdict::reject("missing subtasks: z"));
        assert!(RequireCompletePolicy
            .evaluate(&result("x", vec![]))
            .await
            .is_approved());
    }

    #[tokio::test]
    async fn test_chain_first_rejection_wins() {
        let chain = PolicyChain::new()
            .with(Arc::new(ApproveAll))
            .with(Arc::new(ForbiddenTermsPolicy::new(["secret"])))
            .with(Arc::new(ForbiddenTermsPolicy::new(["other"])));
        assert_eq!(chain.len(), 3);

        let verdict = chain.evaluate(&result("secret and other", vec![])).await;
        assert_eq!(verdict, ComplianceVerdict::reject("forbidden terms present: secret"));
        assert!(PolicyChain::new()
            .evaluate(&result("anything", vec![]))
            .await
            .is_approved());
    }
}
