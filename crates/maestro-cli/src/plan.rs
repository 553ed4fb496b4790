//! Plan files: a fixed decomposition plus scripted executors.
//!
//! ```toml
//! task_type = "report"
//! description = "Quarterly summary"
//! forbidden_terms = ["confidential"]
//!
//! [[executors]]
//! id = "writer"
//! capabilities = ["text"]
//! bid = 0.8
//!
//! [[subtasks]]
//! id = "draft"
//! description = "Write the draft"
//! capabilities = ["text"]
//!
//! [[deny]]
//! executor = "writer"
//! capability = "finance"
//! reason = "writers do not touch finance"
//! ```

use async_trait::async_trait;
use maestro_compliance::{
    CompliancePolicy, ForbiddenTermsPolicy, PolicyChain, RequireCompletePolicy,
};
use maestro_core::{
    Bid, CapabilitySet, Decomposition, ExecutorDescriptor, ExecutorId, ExecutorKind, MaestroError,
    MaestroResult, ReasoningProvider, Subtask, SubtaskId, SubtaskSpec,
};
use maestro_orchestrator::{BidRequest, ExecutionContext, Executor, SubtaskGraph};
use maestro_security::{DenyRule, RulePolicy};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    pub task_type: String,
    pub description: String,
    #[serde(default)]
    pub executors: Vec<ExecutorScript>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskSpec>,
    #[serde(default)]
    pub deny: Vec<DenyRule>,
    #[serde(default)]
    pub forbidden_terms: Vec<String>,
    /// Reject merged results that have gaps.
    #[serde(default)]
    pub require_complete: bool,
}

/// How one executor behaves during a run.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorScript {
    pub id: ExecutorId,
    #[serde(default = "default_kind")]
    pub kind: ExecutorKind,
    #[serde(default)]
    pub capabilities: CapabilitySet,
    #[serde(default)]
    pub subscriptions: BTreeSet<String>,
    #[serde(default = "default_bid")]
    pub bid: f64,
    #[serde(default)]
    pub delay_ms: u64,
    /// Output template. `{subtask}`, `{executor}`, `{description}` and
    /// `{inputs}` are substituted.
    #[serde(default = "default_output")]
    pub output: String,
    /// Fail this many attempts of every subtask before succeeding.
    #[serde(default)]
    pub fail_attempts: u32,
}

fn default_kind() -> ExecutorKind {
    ExecutorKind::Automated
}
fn default_bid() -> f64 {
    0.5
}
fn default_output() -> String {
    "{subtask} done by {executor}".to_string()
}

/// What `validate` found: the wavefronts and who can run each subtask.
#[derive(Debug)]
pub struct PlanReport {
    pub wavefronts: Vec<Vec<SubtaskId>>,
    pub eligible: BTreeMap<SubtaskId, Vec<ExecutorId>>,
}

impl Plan {
    pub fn from_toml_str(s: &str) -> MaestroResult<Self> {
        toml::from_str(s).map_err(|e| MaestroError::Config(format!("invalid plan: {e}")))
    }

    pub fn load(path: &Path) -> MaestroResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn decomposition(&self) -> Decomposition {
        Decomposition::new(self.subtasks.clone())
    }

    pub fn descriptor(script: &ExecutorScript) -> ExecutorDescriptor {
        let mut descriptor =
            ExecutorDescriptor::new(script.id.clone(), script.kind, script.capabilities.clone());
        descriptor.subscriptions = script.subscriptions.clone();
        descriptor
    }

    /// Check the subtask graph and that every subtask has at least one
    /// capable executor.
    pub fn check(&self) -> MaestroResult<PlanReport> {
        let mut seen = BTreeSet::new();
        for script in &self.executors {
            if !seen.insert(&script.id) {
                return Err(MaestroError::Registry(format!(
                    "executor {} is declared twice",
                    script.id
                )));
            }
        }

        let graph = SubtaskGraph::from_decomposition(&self.decomposition())?;
        let mut eligible = BTreeMap::new();
        for spec in &self.subtasks {
            let capable: Vec<ExecutorId> = self
                .executors
                .iter()
                .filter(|s| s.capabilities.satisfies(&spec.capabilities))
                .map(|s| s.id.clone())
                .collect();
            if capable.is_empty() {
                return Err(MaestroError::NoEligibleExecutor {
                    subtask: spec.id.clone(),
                });
            }
            eligible.insert(spec.id.clone(), capable);
        }
        Ok(PlanReport {
            wavefronts: graph.wavefronts(),
            eligible,
        })
    }

    pub fn compliance_policy(&self) -> Arc<dyn CompliancePolicy> {
        let mut chain = PolicyChain::new();
        if !self.forbidden_terms.is_empty() {
            chain = chain.with(Arc::new(ForbiddenTermsPolicy::new(
                self.forbidden_terms.iter().cloned(),
            )));
        }
        if self.require_complete {
            chain = chain.with(Arc::new(RequireCompletePolicy));
        }
        Arc::new(chain)
    }

    pub fn authorization_policy(&self) -> RulePolicy {
        RulePolicy::new(self.deny.clone())
    }
}

/// Reasoning provider that always returns the plan's decomposition.
pub struct ScriptedReasoning {
    decomposition: Decomposition,
}

impl ScriptedReasoning {
    pub fn new(plan: &Plan) -> Self {
        Self {
            decomposition: plan.decomposition(),
        }
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedReasoning {
    async fn decompose(&self, _description: &str) -> MaestroResult<Decomposition> {
        Ok(self.decomposition.clone())
    }
}

/// Automated executor driven by an [`ExecutorScript`].
pub struct ScriptedExecutor {
    script: ExecutorScript,
}

impl ScriptedExecutor {
    pub fn new(script: ExecutorScript) -> Self {
        Self { script }
    }

    fn render(&self, subtask: &Subtask, ctx: &ExecutionContext) -> String {
        let inputs: Vec<&str> = ctx.dependency_outputs.values().map(String::as_str).collect();
        self.script
            .output
            .replace("{subtask}", subtask.id.as_str())
            .replace("{executor}", self.script.id.as_str())
            .replace("{description}", &subtask.description)
            .replace("{inputs}", &inputs.join("; "))
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn bid(&self, request: &BidRequest) -> Option<Bid> {
        Some(Bid::new(
            request.subtask.id.clone(),
            self.script.id.clone(),
            self.script.bid,
        ))
    }

    async fn execute(&self, subtask: &Subtask, ctx: &ExecutionContext) -> MaestroResult<String> {
        if self.script.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.script.delay_ms)).await;
        }
        if ctx.attempt <= self.script.fail_attempts {
            return Err(MaestroError::SubtaskExecution {
                subtask: subtask.id.clone(),
                message: format!("scripted failure on attempt {}", ctx.attempt),
            });
        }
        Ok(self.render(subtask, ctx))
    }
}
