//! Compliance review for merged task results.
//!
//! Merged results pass a [`ComplianceGate`] that consults a pluggable
//! [`CompliancePolicy`]. Rejections trigger a bounded number of
//! re-syntheses. Lifecycle events from the engine flow through a
//! [`ComplianceHookChain`] for audit and tracking.
//!
//! # Main types
//!
//! - [`CompliancePolicy`]: Trait implemented by external policy engines.
//! - [`ComplianceGate`]: Verdicts plus the counter-driven revision loop.
//! - [`ComplianceEvent`]: Lifecycle events reported to hooks.
//! - [`RecordingHook`]: In-memory event recorder.

/// The bounded compliance revision gate.
pub mod gate;
/// Runtime compliance event hooks.
pub mod hooks;
/// Compliance policy trait and built-in policies.
pub mod policy;

pub use gate::ComplianceGate;
pub use hooks::{ComplianceEvent, ComplianceHook, ComplianceHookChain, RecordingHook, TracingHook};
pub use policy::{
    ApproveAll, CompliancePolicy, ForbiddenTermsPolicy, PolicyChain, RequireCompletePolicy,
};
