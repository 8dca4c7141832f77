//! Security module for osgate: the command safety gate and audit logging.
//!
//! Provides:
//! - **Safety gate**: a deny-list veto applied to every model-proposed command
//! - **Audit logging**: structured record of gate verdicts and executions

pub mod audit;
pub mod command_gate;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use command_gate::{GateVerdict, SafetyGate};
