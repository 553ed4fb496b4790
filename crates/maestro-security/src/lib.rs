//! Authorization for the Maestro engine.
//!
//! Every (executor, subtask) pair passes through the [`SecurityGate`] before
//! dispatch. The gate consults an external [`AuthorizationPolicy`] and
//! records each decision in an [`AuditLog`].
//!
//! # Main types
//!
//! - [`AuthorizationPolicy`]: Trait implemented by external policy engines.
//! - [`RulePolicy`]: Static deny-list policy built from [`DenyRule`]s.
//! - [`SecurityGate`]: Policy check plus audit trail.
//! - [`AuditLog`]: Append-only audit trail, optionally persisted to disk.

/// Audit logging module.
pub mod audit;
/// The pre-dispatch authorization gate.
pub mod gate;
/// Authorization policy trait and built-in policies.
pub mod policy;

pub use audit::{AuditEntry, AuditLog, AuditOutcome};
pub use gate::SecurityGate;
pub use policy::{AllowAll, AuthorizationPolicy, DenyRule, RulePolicy};
