//! Adaptive multi-executor task orchestration.
//!
//! A task is decomposed by an external reasoning capability into a graph of
//! subtasks. Subtasks run wavefront by wavefront on registered executors
//! chosen from learned performance, exploration or a bidding round, behind a
//! security gate. Successful outputs are shared through a knowledge store and
//! merged into one result that must pass compliance review.
//!
//! # Main types
//!
//! - [`Orchestrator`]: Runs the decompose, execute, synthesize and review pipeline.
//! - [`AgentRegistry`]: Registered executors, their load and subscriptions.
//! - [`AdaptiveAllocator`]: Picks an executor per subtask.
//! - [`PerformanceStore`]: Learned quality per (task type, executor).
//! - [`SubtaskGraph`]: Dependency validation and wavefront layering.
//! - [`ResultSynthesizer`]: Merges subtask outputs with gap annotations.
//! - [`ExecutorMonitor`]: Per-executor dispatch counters.

/// Executor selection: exploration, learned performance, negotiation.
pub mod allocator;
/// Engine configuration loaded from TOML.
pub mod config;
/// The orchestration engine.
pub mod engine;
/// The executor trait and the human-in-the-loop adapter.
pub mod executor;
/// Quality feedback applied after a task finishes.
pub mod feedback;
/// Subtask dependency graph.
pub mod graph;
/// Knowledge propagation to subscribed executors.
pub mod knowledge;
/// Executor dispatch metrics.
pub mod monitor;
/// Bidding rounds between eligible executors.
pub mod negotiation;
/// EMA performance scores.
pub mod performance;
/// Executor registry and load tracking.
pub mod registry;
/// Result synthesis and merge strategies.
pub mod synthesizer;
/// Task outcomes and failure reports.
pub mod types;

pub use allocator::{AdaptiveAllocator, Allocation, AllocationReason};
pub use config::OrchestratorConfig;
pub use engine::{Orchestrator, OrchestratorBuilder, TaskHandle};
pub use executor::{BidRequest, ExecutionContext, Executor, HumanExecutor};
pub use feedback::apply_feedback;
pub use graph::SubtaskGraph;
pub use knowledge::{knowledge_key, KnowledgePropagator};
pub use monitor::{ExecutorMetrics, ExecutorMonitor};
pub use negotiation::{best_candidate, Negotiator};
pub use performance::{ema, PerformanceEntry, PerformanceRecord, PerformanceStore, NEUTRAL_PRIOR};
pub use registry::{AgentRegistry, LoadGuard};
pub use synthesizer::{MergeStrategy, OrderedConcatenation, ReasoningMerge, ResultSynthesizer};
pub use types::{TaskFailure, TaskOutcome};
