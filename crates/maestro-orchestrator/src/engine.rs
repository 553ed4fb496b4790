use crate::allocator::AdaptiveAllocator;
use crate::config::OrchestratorConfig;
use crate::executor::{ExecutionContext, Executor};
use crate::feedback::apply_feedback;
use crate::graph::SubtaskGraph;
use crate::knowledge::KnowledgePropagator;
use crate::monitor::ExecutorMonitor;
use crate::negotiation::Negotiator;
use crate::performance::PerformanceStore;
use crate::registry::AgentRegistry;
use crate::synthesizer::{MergeStrategy, ResultSynthesizer};
use crate::types::{TaskFailure, TaskOutcome};
use chrono::Utc;
use maestro_compliance::{
    ApproveAll, ComplianceEvent, ComplianceGate, ComplianceHook, ComplianceHookChain,
    CompliancePolicy,
};
use maestro_core::{
    AuthorizationDecision, ErrorKind, ExecutorDescriptor, ExecutorId, MaestroError,
    MaestroResult, ReasoningProvider, Subtask, SubtaskId, SubtaskStatus, Task, TaskStatus,
};
use maestro_memory::{InMemoryKnowledgeStore, KnowledgeStore};
use maestro_security::SecurityGate;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

struct Engine {
    config: OrchestratorConfig,
    reasoning: Arc<dyn ReasoningProvider>,
    registry: Arc<AgentRegistry>,
    performance: Arc<PerformanceStore>,
    allocator: AdaptiveAllocator,
    security: Arc<SecurityGate>,
    synthesizer: ResultSynthesizer,
    compliance: ComplianceGate,
    knowledge: KnowledgePropagator,
    hooks: Arc<ComplianceHookChain>,
    monitor: ExecutorMonitor,
}

/// The orchestration engine.
///
/// Runs the decompose → execute → synthesize → review pipeline for each
/// submitted task. Cloning is cheap; clones share the registry, the
/// performance store and the knowledge store.
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<Engine>,
}

/// Configures the collaborators of an [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    reasoning: Arc<dyn ReasoningProvider>,
    registry: Option<Arc<AgentRegistry>>,
    performance: Option<Arc<PerformanceStore>>,
    security: Option<Arc<SecurityGate>>,
    compliance_policy: Option<Arc<dyn CompliancePolicy>>,
    knowledge_store: Option<Arc<dyn KnowledgeStore>>,
    merge_strategy: Option<Arc<dyn MergeStrategy>>,
    hooks: ComplianceHookChain,
}

impl OrchestratorBuilder {
    pub fn registry(mut self, registry: Arc<AgentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn performance(mut self, performance: Arc<PerformanceStore>) -> Self {
        self.performance = Some(performance);
        self
    }

    pub fn security(mut self, security: Arc<SecurityGate>) -> Self {
        self.security = Some(security);
        self
    }

    pub fn compliance_policy(mut self, policy: Arc<dyn CompliancePolicy>) -> Self {
        self.compliance_policy = Some(policy);
        self
    }

    pub fn knowledge_store(mut self, store: Arc<dyn KnowledgeStore>) -> Self {
        self.knowledge_store = Some(store);
        self
    }

    pub fn merge_strategy(mut self, strategy: Arc<dyn MergeStrategy>) -> Self {
        self.merge_strategy = Some(strategy);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn ComplianceHook>) -> Self {
        self.hooks.add(hook);
        self
    }

    pub fn build(self) -> MaestroResult<Orchestrator> {
        self.config.validate()?;
        let config = self.config;

        let registry = self.registry.unwrap_or_default();
        let performance = self
            .performance
            .unwrap_or_else(|| Arc::new(PerformanceStore::new(config.alpha)));
        let allocator = AdaptiveAllocator::new(
            registry.clone(),
            performance.clone(),
            Negotiator::new(config.negotiation_timeout()),
            config.epsilon,
            config.seed,
        );
        let hooks = Arc::new(self.hooks);
        let compliance = ComplianceGate::new(
            self.compliance_policy.unwrap_or_else(|| Arc::new(ApproveAll)),
            config.max_revisions,
        )
        .with_hooks(hooks.clone());
        let store = self
            .knowledge_store
            .unwrap_or_else(|| Arc::new(InMemoryKnowledgeStore::new()));
        let synthesizer = self
            .merge_strategy
            .map(ResultSynthesizer::new)
            .unwrap_or_default();

        Ok(Orchestrator {
            engine: Arc::new(Engine {
                knowledge: KnowledgePropagator::new(store, registry.clone()),
                reasoning: self.reasoning,
                security: self.security.unwrap_or_default(),
                registry,
                performance,
                allocator,
                synthesizer,
                compliance,
                hooks,
                monitor: ExecutorMonitor::new(),
                config,
            }),
        })
    }
}

/// Handle to a task running in the background.
pub struct TaskHandle {
    task_id: Uuid,
    cancel: CancellationToken,
    join: JoinHandle<TaskOutcome>,
}

impl TaskHandle {
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Request cancellation. Subtasks not yet dispatched fail immediately;
    /// running executors receive a best-effort abort.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this task, usable after the handle is joined.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn join(self) -> MaestroResult<TaskOutcome> {
        match self.join.await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(MaestroError::Cancelled),
        }
    }
}

/// Per-task data shared by the dispatch workers.
#[derive(Clone)]
struct TaskContext {
    id: Uuid,
    description: String,
    task_type: String,
    cancel: CancellationToken,
    permits: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn builder(
        config: OrchestratorConfig,
        reasoning: Arc<dyn ReasoningProvider>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            reasoning,
            registry: None,
            performance: None,
            security: None,
            compliance_policy: None,
            knowledge_store: None,
            merge_strategy: None,
            hooks: ComplianceHookChain::new(),
        }
    }

    /// Register an executor with the shared registry.
    pub fn register(
        &self,
        descriptor: ExecutorDescriptor,
        handle: Arc<dyn Executor>,
    ) -> MaestroResult<()> {
        self.engine.registry.register(descriptor, handle)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.engine.config
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.engine.registry
    }

    pub fn performance(&self) -> &Arc<PerformanceStore> {
        &self.engine.performance
    }

    pub fn monitor(&self) -> &ExecutorMonitor {
        &self.engine.monitor
    }

    pub fn security(&self) -> &Arc<SecurityGate> {
        &self.engine.security
    }

    pub fn knowledge_store(&self) -> &Arc<dyn KnowledgeStore> {
        self.engine.knowledge.store()
    }

    /// Run a task to completion.
    pub async fn run(&self, description: &str, task_type: &str) -> TaskOutcome {
        self.run_task(Task::new(description, task_type), CancellationToken::new())
            .await
    }

    /// Run a task that stops early once `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        description: &str,
        task_type: &str,
        cancel: CancellationToken,
    ) -> TaskOutcome {
        self.run_task(Task::new(description, task_type), cancel).await
    }

    /// Start a task in the background.
    pub fn submit(&self, description: &str, task_type: &str) -> TaskHandle {
        let task = Task::new(description, task_type);
        let task_id = task.id;
        let cancel = CancellationToken::new();
        let this = self.clone();
        let token = cancel.clone();
        let join = tokio::spawn(async move { this.run_task(task, token).await });
        TaskHandle {
            task_id,
            cancel,
            join,
        }
    }

    /// Feed an observed quality score for a finished task back into the
    /// performance store.
    pub fn feedback(
        &self,
        outcome: &TaskOutcome,
        quality: f64,
    ) -> MaestroResult<BTreeMap<ExecutorId, f64>> {
        apply_feedback(&self.engine.performance, outcome, quality)
    }

    async fn run_task(&self, mut task: Task, cancel: CancellationToken) -> TaskOutcome {
        let engine = &self.engine;
        let started = Instant::now();
        info!(task_id = %task.id, task_type = %task.task_type, "task accepted");

        let decomposition = match engine.reasoning.decompose(&task.description).await {
            Ok(d) => d,
            Err(e) => {
                let failure = TaskFailure {
                    kind: ErrorKind::Decomposition,
                    subtasks: Vec::new(),
                    message: e.to_string(),
                };
                return self.finish(task, Vec::new(), Err(failure)).await;
            }
        };
        let mut subtasks = decomposition.into_subtasks(task.id);
        let graph = match SubtaskGraph::from_subtasks(&subtasks) {
            Ok(g) => g,
            Err(e) => {
                let failure = TaskFailure {
                    kind: e.kind(),
                    subtasks: Vec::new(),
                    message: e.to_string(),
                };
                return self.finish(task, subtasks, Err(failure)).await;
            }
        };

        task.transition(TaskStatus::Decomposed);
        info!(task_id = %task.id, subtasks = subtasks.len(), "task decomposed");
        engine
            .hooks
            .emit(ComplianceEvent::TaskStarted {
                task_id: task.id,
                task_type: task.task_type.clone(),
                subtasks: subtasks.len(),
                timestamp: Utc::now(),
            })
            .await;

        task.transition(TaskStatus::Executing);
        let ctx = TaskContext {
            id: task.id,
            description: task.description.clone(),
            task_type: task.task_type.clone(),
            cancel: cancel.clone(),
            permits: Arc::new(Semaphore::new(engine.config.max_parallel_degree)),
        };
        self.execute_waves(&ctx, &graph, &mut subtasks).await;

        if cancel.is_cancelled() {
            let failure = TaskFailure {
                kind: ErrorKind::Cancelled,
                subtasks: subtasks
                    .iter()
                    .filter(|s| s.error.as_ref().map(|e| e.kind) == Some(ErrorKind::Cancelled))
                    .map(|s| s.id.clone())
                    .collect(),
                message: "task cancelled".into(),
            };
            return self.finish(task, subtasks, Err(failure)).await;
        }

        if engine.config.require_all {
            if let Some(failure) = root_failure(&subtasks) {
                return self.finish(task, subtasks, Err(failure)).await;
            }
        }

        task.transition(TaskStatus::Synthesizing);
        let initial = match engine.synthesizer.synthesize(&task, &subtasks, None).await {
            Ok(result) => result,
            Err(e) => {
                let failure = TaskFailure {
                    kind: e.kind(),
                    subtasks: Vec::new(),
                    message: e.to_string(),
                };
                return self.finish(task, subtasks, Err(failure)).await;
            }
        };

        let snapshot = task.clone();
        let reviewed = {
            let snapshot = &snapshot;
            let ordered = &subtasks;
            let synthesizer = &engine.synthesizer;
            engine
                .compliance
                .review(&mut task, initial, |req| async move {
                    synthesizer.synthesize(snapshot, ordered, Some(&req)).await
                })
                .await
        };

        let outcome = match reviewed {
            Ok(result) => Ok(result),
            Err(e) => Err(TaskFailure {
                kind: e.kind(),
                subtasks: Vec::new(),
                message: e.to_string(),
            }),
        };
        let outcome = self.finish(task, subtasks, outcome).await;
        info!(
            task_id = %outcome.task.id,
            status = ?outcome.task.status,
            duration_ms = started.elapsed().as_millis() as u64,
            "task finished"
        );
        outcome
    }

    async fn finish(
        &self,
        mut task: Task,
        subtasks: Vec<Subtask>,
        result: Result<maestro_core::MergedResult, TaskFailure>,
    ) -> TaskOutcome {
        let (result, failure) = match result {
            Ok(result) => {
                task.transition(TaskStatus::Completed);
                (Some(result), None)
            }
            Err(failure) => {
                warn!(
                    task_id = %task.id,
                    kind = %failure.kind,
                    subtasks = ?failure.subtasks,
                    message = %failure.message,
                    "task failed"
                );
                task.transition(TaskStatus::Failed);
                (None, Some(failure))
            }
        };
        self.engine
            .hooks
            .emit(ComplianceEvent::TaskFinished {
                task_id: task.id,
                status: task.status,
                timestamp: Utc::now(),
            })
            .await;
        TaskOutcome {
            task,
            subtasks,
            result,
            failure,
        }
    }

    /// Dispatch wavefront after wavefront. Returns once every subtask is
    /// terminal.
    async fn execute_waves(
        &self,
        ctx: &TaskContext,
        graph: &SubtaskGraph,
        subtasks: &mut [Subtask],
    ) {
        let require_all = self.engine.config.require_all;
        let mut halted_by: Option<SubtaskId> = None;

        for wave in graph.wavefronts() {
            let mut running = JoinSet::new();
            let mut dispatched = Vec::new();

            for id in &wave {
                let Some(idx) = graph.position(id) else {
                    continue;
                };

                if ctx.cancel.is_cancelled() {
                    subtasks[idx].fail(ErrorKind::Cancelled, "task cancelled before dispatch");
                    self.report_failure(ctx.id, &subtasks[idx]).await;
                    continue;
                }
                if let Some(cause) = &halted_by {
                    subtasks[idx].fail(
                        ErrorKind::DependencyFailed,
                        format!("not dispatched: subtask {cause} failed"),
                    );
                    self.report_failure(ctx.id, &subtasks[idx]).await;
                    continue;
                }

                let failed_dep = subtasks[idx]
                    .dependencies
                    .iter()
                    .find(|dep| {
                        graph
                            .position(dep)
                            .map_or(true, |j| subtasks[j].status != SubtaskStatus::Succeeded)
                    })
                    .cloned();
                if let Some(dep) = failed_dep {
                    subtasks[idx].fail(
                        ErrorKind::DependencyFailed,
                        format!("dependency {dep} did not succeed"),
                    );
                    self.report_failure(ctx.id, &subtasks[idx]).await;
                    continue;
                }

                let dependency_outputs: BTreeMap<SubtaskId, String> = subtasks[idx]
                    .dependencies
                    .iter()
                    .filter_map(|dep| {
                        let j = graph.position(dep)?;
                        let output = subtasks[j].output.clone()?;
                        Some((dep.clone(), output))
                    })
                    .collect();

                running.spawn(self.clone().dispatch(
                    ctx.clone(),
                    subtasks[idx].clone(),
                    dependency_outputs,
                ));
                dispatched.push(idx);
            }

            while let Some(joined) = running.join_next().await {
                match joined {
                    Ok(done) => {
                        if let Some(idx) = graph.position(&done.id) {
                            subtasks[idx] = done;
                        }
                    }
                    Err(e) => error!(task_id = %ctx.id, error = %e, "dispatch worker crashed"),
                }
            }
            for idx in dispatched {
                if !subtasks[idx].is_terminal() {
                    subtasks[idx].fail(
                        ErrorKind::Internal,
                        "dispatch worker ended without a result",
                    );
                    self.report_failure(ctx.id, &subtasks[idx]).await;
                }
            }

            if require_all && halted_by.is_none() {
                halted_by = wave
                    .iter()
                    .filter_map(|id| graph.position(id))
                    .map(|idx| &subtasks[idx])
                    .find(|s| matches!(s.status, SubtaskStatus::Failed | SubtaskStatus::Denied))
                    .map(|s| s.id.clone());
                if let Some(cause) = &halted_by {
                    warn!(task_id = %ctx.id, subtask = %cause, "halting later wavefronts");
                }
            }
        }
    }

    async fn report_failure(&self, task_id: Uuid, subtask: &Subtask) {
        let (kind, message) = subtask
            .error
            .as_ref()
            .map(|e| (e.kind, e.message.clone()))
            .unwrap_or((ErrorKind::Internal, String::new()));
        warn!(
            task_id = %task_id,
            subtask = %subtask.id,
            kind = %kind,
            message = %message,
            "subtask failed"
        );
        self.engine
            .hooks
            .emit(ComplianceEvent::SubtaskFailed {
                task_id,
                subtask_id: subtask.id.clone(),
                kind,
                message,
                timestamp: Utc::now(),
            })
            .await;
    }

    /// Allocate, authorize and run one subtask, retrying on the same
    /// executor. Always returns the subtask in a terminal state.
    async fn dispatch(
        self,
        ctx: TaskContext,
        mut subtask: Subtask,
        dependency_outputs: BTreeMap<SubtaskId, String>,
    ) -> Subtask {
        let engine = &self.engine;

        let _permit = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                subtask.fail(ErrorKind::Cancelled, "task cancelled before dispatch");
                self.report_failure(ctx.id, &subtask).await;
                return subtask;
            }
            permit = ctx.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    subtask.fail(ErrorKind::Internal, "worker pool closed");
                    self.report_failure(ctx.id, &subtask).await;
                    return subtask;
                }
            },
        };

        // Allocate until the security gate lets an executor through.
        let (executor, plan) = loop {
            if ctx.cancel.is_cancelled() {
                subtask.fail(ErrorKind::Cancelled, "task cancelled before dispatch");
                self.report_failure(ctx.id, &subtask).await;
                return subtask;
            }
            let allocation = match engine
                .allocator
                .allocate(ctx.id, &ctx.task_type, &subtask)
                .await
            {
                Ok(allocation) => allocation,
                Err(e) => {
                    if matches!(e, MaestroError::NoEligibleExecutor { .. })
                        && !subtask.denied_by.is_empty()
                    {
                        let denied: Vec<&str> =
                            subtask.denied_by.iter().map(ExecutorId::as_str).collect();
                        subtask.deny(format!(
                            "every eligible executor was denied: {}",
                            denied.join(", ")
                        ));
                    } else {
                        subtask.fail(e.kind(), e.to_string());
                    }
                    self.report_failure(ctx.id, &subtask).await;
                    return subtask;
                }
            };

            let Some(descriptor) = engine.registry.descriptor(&allocation.executor) else {
                subtask.fail(
                    ErrorKind::Internal,
                    format!("executor {} vanished from the registry", allocation.executor),
                );
                self.report_failure(ctx.id, &subtask).await;
                return subtask;
            };
            subtask.status = SubtaskStatus::Allocated;
            subtask.assigned_to = Some(allocation.executor.clone());

            match engine.security.authorize(&descriptor, &subtask).await {
                AuthorizationDecision::Allow => break (allocation.executor, allocation.plan),
                AuthorizationDecision::Deny { reason } => {
                    engine.monitor.record_denial(&allocation.executor).await;
                    engine
                        .hooks
                        .emit(ComplianceEvent::AuthorizationDenied {
                            task_id: ctx.id,
                            subtask_id: subtask.id.clone(),
                            executor_id: allocation.executor.clone(),
                            reason,
                            timestamp: Utc::now(),
                        })
                        .await;
                    subtask.denied_by.insert(allocation.executor);
                    subtask.assigned_to = None;
                    subtask.status = SubtaskStatus::Pending;
                }
            }
        };

        let Some(handle) = engine.registry.handle(&executor) else {
            subtask.fail(ErrorKind::Internal, format!("executor {executor} has no handle"));
            self.report_failure(ctx.id, &subtask).await;
            return subtask;
        };
        let _load = engine.registry.acquire(&executor);
        let max_attempts = engine.config.max_attempts();
        let timeout = engine.config.subtask_timeout();
        let mut attempt = 0;

        loop {
            attempt += 1;
            subtask.attempt_count = attempt;
            subtask.status = SubtaskStatus::Dispatched;
            if subtask.dispatched_at.is_none() {
                subtask.dispatched_at = Some(Utc::now());
            }
            engine.monitor.record_dispatch(&executor).await;
            engine
                .hooks
                .emit(ComplianceEvent::SubtaskDispatched {
                    task_id: ctx.id,
                    subtask_id: subtask.id.clone(),
                    executor_id: executor.clone(),
                    attempt,
                    timestamp: Utc::now(),
                })
                .await;
            info!(
                task_id = %ctx.id,
                subtask = %subtask.id,
                executor = %executor,
                attempt,
                "subtask dispatched"
            );

            let exec_ctx = ExecutionContext {
                task_id: ctx.id,
                task_description: ctx.description.clone(),
                task_type: ctx.task_type.clone(),
                dependency_outputs: dependency_outputs.clone(),
                plan: plan.clone(),
                attempt,
            };
            let started = Instant::now();
            let execution = tokio::time::timeout(timeout, handle.execute(&subtask, &exec_ctx));
            let result = tokio::select! {
                _ = ctx.cancel.cancelled() => None,
                r = execution => Some(match r {
                    Ok(result) => result.map_err(|e| executor_error(&subtask.id, e)),
                    Err(_) => Err(MaestroError::SubtaskTimeout {
                        subtask: subtask.id.clone(),
                        after: timeout,
                    }),
                }),
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let Some(result) = result else {
                handle.abort(&subtask.id).await;
                subtask.fail(ErrorKind::Cancelled, "task cancelled during execution");
                self.report_failure(ctx.id, &subtask).await;
                return subtask;
            };

            match result {
                Ok(output) => {
                    subtask.succeed(output);
                    engine.monitor.record_success(&executor, elapsed_ms).await;
                    engine
                        .hooks
                        .emit(ComplianceEvent::SubtaskCompleted {
                            task_id: ctx.id,
                            subtask_id: subtask.id.clone(),
                            executor_id: executor.clone(),
                            duration_ms: elapsed_ms,
                            timestamp: Utc::now(),
                        })
                        .await;
                    info!(
                        task_id = %ctx.id,
                        subtask = %subtask.id,
                        executor = %executor,
                        elapsed_ms,
                        "subtask succeeded"
                    );
                    engine.knowledge.propagate(ctx.id, &subtask, &executor).await;
                    return subtask;
                }
                Err(e) => {
                    let timed_out = matches!(e, MaestroError::SubtaskTimeout { .. });
                    engine
                        .monitor
                        .record_failure(&executor, timed_out, elapsed_ms)
                        .await;
                    if timed_out {
                        handle.abort(&subtask.id).await;
                    }
                    if e.is_retryable() && attempt < max_attempts {
                        let delay = engine.config.retry_backoff(attempt);
                        warn!(
                            task_id = %ctx.id,
                            subtask = %subtask.id,
                            executor = %executor,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "subtask attempt failed, retrying"
                        );
                        tokio::select! {
                            _ = ctx.cancel.cancelled() => {
                                subtask.fail(
                                    ErrorKind::Cancelled,
                                    "task cancelled during retry backoff",
                                );
                                self.report_failure(ctx.id, &subtask).await;
                                return subtask;
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                        continue;
                    }
                    subtask.fail(e.kind(), e.to_string());
                    self.report_failure(ctx.id, &subtask).await;
                    return subtask;
                }
            }
        }
    }
}

/// Any error an executor reports counts as a failed attempt of the subtask.
/// Timeouts keep their own kind; everything else becomes `SubtaskExecution`
/// with the original message.
fn executor_error(subtask: &SubtaskId, e: MaestroError) -> MaestroError {
    match e {
        MaestroError::SubtaskTimeout { .. } | MaestroError::SubtaskExecution { .. } => e,
        other => MaestroError::SubtaskExecution {
            subtask: subtask.clone(),
            message: other.to_string(),
        },
    }
}

/// First-cause failure for `require_all` runs: subtasks that failed or were
/// denied on their own, ignoring those that only inherited a failure.
fn root_failure(subtasks: &[Subtask]) -> Option<TaskFailure> {
    let causes: Vec<&Subtask> = subtasks
        .iter()
        .filter(|s| matches!(s.status, SubtaskStatus::Failed | SubtaskStatus::Denied))
        .filter(|s| s.error.as_ref().map(|e| e.kind) != Some(ErrorKind::DependencyFailed))
        .collect();
    let first = causes.first()?;
    let (kind, message) = first
        .error
        .as_ref()
        .map(|e| (e.kind, e.message.clone()))
        .unwrap_or((ErrorKind::Internal, String::new()));
    Some(TaskFailure {
        kind,
        subtasks: causes.iter().map(|s| s.id.clone()).collect(),
        message,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use maestro_core::{CapabilitySet, SubtaskSpec};

    #[test]
    fn test_root_failure_ignores_inherited() {
        let parent = Uuid::new_v4();
        let mut a = Subtask::new(parent, "a", "", CapabilitySet::new());
        a.fail(ErrorKind::DependencyFailed, "dependency z did not succeed");
        let mut z = Subtask::new(parent, "z", "", CapabilitySet::new());
        z.deny("every eligible executor was denied: e1");
        let mut ok = Subtask::new(parent, "ok", "", CapabilitySet::new());
        ok.succeed("fine".into());

        let failure = root_failure(&[a, z, ok]).unwrap();
        assert_eq!(failure.kind, ErrorKind::NoEligibleExecutor);
        assert_eq!(failure.subtasks, vec![SubtaskId::from("z")]);
        assert!(root_failure(&[]).is_none());
    }

    struct Cyclic;

    #[async_trait::async_trait]
    impl ReasoningProvider for Cyclic {
        async fn decompose(
            &self,
            _description: &str,
        ) -> MaestroResult<maestro_core::Decomposition> {
            Ok(maestro_core::Decomposition::new(vec![
                SubtaskSpec::new("a", "").after(["b"]),
                SubtaskSpec::new("b", "").after(["a"]),
            ]))
        }
    }

    #[tokio::test]
    async fn test_cyclic_decomposition_fails_task() {
        let orchestrator = Orchestrator::builder(OrchestratorConfig::default(), Arc::new(Cyclic))
            .build()
            .unwrap();
        let outcome = orchestrator.run("loop forever", "t").await;
        assert_eq!(outcome.task.status, TaskStatus::Failed);
        assert_eq!(outcome.failure.unwrap().kind, ErrorKind::Decomposition);
        assert!(outcome.result.is_none());
    }

    #[test]
    fn test_executor_errors_become_retryable() {
        let id = SubtaskId::from("s");
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        let wrapped = executor_error(&id, MaestroError::Io(io));
        assert!(wrapped.is_retryable());
        assert_eq!(wrapped.kind(), ErrorKind::SubtaskExecution);
        assert!(wrapped.to_string().contains("connection reset"));

        let timeout = MaestroError::SubtaskTimeout {
            subtask: id.clone(),
            after: std::time::Duration::from_secs(1),
        };
        assert_eq!(executor_error(&id, timeout).kind(), ErrorKind::SubtaskTimeout);
    }

    #[test]
    fn test_invalid_config_rejected_by_builder() {
        let config = OrchestratorConfig {
            epsilon: 2.0,
            ..Default::default()
        };
        assert!(Orchestrator::builder(config, Arc::new(Cyclic)).build().is_err());
    }
}
