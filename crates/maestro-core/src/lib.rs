//! Core types and error definitions for the Maestro orchestration engine.
//!
//! This crate provides the data model shared across all Maestro crates:
//! tasks and subtasks, executor descriptors, capability sets, bids,
//! knowledge entries, verdicts, and the external reasoning/human interfaces.
//!
//! # Main types
//!
//! - [`MaestroError`]: Unified error enum covering the failure taxonomy.
//! - [`MaestroResult`]: Convenience alias for `Result<T, MaestroError>`.
//! - [`CapabilitySet`]: Capability tags compared by subset inclusion.
//! - [`Task`] / [`Subtask`]: Units of work and their lifecycles.
//! - [`ExecutorDescriptor`]: An automated or human executor and its capabilities.
//! - [`MergedResult`]: Synthesized output with annotated gaps.
//! - [`ReasoningProvider`]: Boundary to the external decomposition capability.

/// Capability tags and subset checks.
pub mod capability;
/// Error taxonomy.
pub mod error;
/// Executor identity, kinds, descriptors and bids.
pub mod executor;
/// Shared knowledge entries.
pub mod knowledge;
/// External reasoning and human-in-the-loop interfaces.
pub mod reasoning;
/// Tasks, subtasks and their statuses.
pub mod task;
/// Authorization decisions, compliance verdicts and merged results.
pub mod verdict;

pub use capability::{CapabilitySet, GENERAL_DOMAIN};
pub use error::{ErrorKind, MaestroError, MaestroResult};
pub use executor::{Bid, ExecutorDescriptor, ExecutorId, ExecutorKind};
pub use knowledge::KnowledgeEntry;
pub use reasoning::{Decomposition, HumanInterface, ReasoningProvider, SubtaskSpec};
pub use task::{Subtask, SubtaskError, SubtaskId, SubtaskStatus, Task, TaskStatus};
pub use verdict::{AuthorizationDecision, ComplianceVerdict, Gap, MergedResult, RevisionRequest};
