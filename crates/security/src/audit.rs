//! Command audit trail.
//!
//! The safety gate records a verdict for every command the model proposes,
//! and the executor records how each admitted command ended. Entries stay
//! in memory for the session summary and are mirrored to any sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// What happened to a command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// The safety gate admitted a command
    CommandAllowed,
    /// The safety gate vetoed a command
    CommandDenied { pattern: String },
    /// A command ran to completion
    CommandExecuted { exit_code: i32 },
    /// A command exceeded its wall-clock limit
    CommandTimedOut { timeout_secs: u64 },
    /// A command could not be spawned or awaited
    CommandFailed,
}

impl AuditEvent {
    pub fn outcome(&self) -> AuditOutcome {
        match self {
            Self::CommandAllowed | Self::CommandExecuted { exit_code: 0 } => AuditOutcome::Success,
            Self::CommandDenied { .. } => AuditOutcome::Denied,
            Self::CommandExecuted { .. } | Self::CommandTimedOut { .. } | Self::CommandFailed => {
                AuditOutcome::Failure
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

/// One recorded command event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// Which part of the gateway recorded it (`safety_gate`, `executor`)
    pub component: String,
    /// The command line as the gate saw it
    pub command: String,
    pub event: AuditEvent,
    pub details: Option<String>,
}

impl AuditEntry {
    pub fn outcome(&self) -> AuditOutcome {
        self.event.outcome()
    }
}

/// Somewhere audit entries are mirrored to as they are recorded.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Session-scoped audit log shared by the gate and the executor.
#[derive(Default)]
pub struct AuditLogger {
    entries: Mutex<Vec<AuditEntry>>,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entries", &self.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn record(&self, component: &str, command: &str, event: AuditEvent, details: Option<String>) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            component: component.into(),
            command: command.into(),
            event,
            details,
        };
        for sink in &self.sinks {
            sink.record(&entry);
        }
        self.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    /// How many entries ended with `outcome`.
    pub fn count_outcome(&self, outcome: AuditOutcome) -> usize {
        self.lock().iter().filter(|e| e.outcome() == outcome).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panicking sink must not take the trail down with it.
    fn lock(&self) -> MutexGuard<'_, Vec<AuditEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mirrors entries into the log output; denials at `warn`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        let outcome = entry.outcome();
        if outcome == AuditOutcome::Denied {
            tracing::warn!(
                component = %entry.component,
                command = %entry.command,
                event = ?entry.event,
                details = ?entry.details,
                "audit"
            );
        } else {
            tracing::info!(
                component = %entry.component,
                command = %entry.command,
                event = ?entry.event,
                outcome = ?outcome,
                "audit"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn outcome_follows_the_event() {
        assert_eq!(AuditEvent::CommandAllowed.outcome(), AuditOutcome::Success);
        assert_eq!(AuditEvent::CommandExecuted { exit_code: 0 }.outcome(), AuditOutcome::Success);
        assert_eq!(AuditEvent::CommandExecuted { exit_code: 2 }.outcome(), AuditOutcome::Failure);
        assert_eq!(AuditEvent::CommandTimedOut { timeout_secs: 60 }.outcome(), AuditOutcome::Failure);
        assert_eq!(
            AuditEvent::CommandDenied { pattern: "mkfs".into() }.outcome(),
            AuditOutcome::Denied
        );
    }

    #[test]
    fn entries_keep_order_and_count_by_outcome() {
        let audit = AuditLogger::new();
        audit.record("safety_gate", "echo hi", AuditEvent::CommandAllowed, None);
        audit.record("executor", "echo hi", AuditEvent::CommandExecuted { exit_code: 0 }, None);
        audit.record(
            "safety_gate",
            "rm -rf /",
            AuditEvent::CommandDenied { pattern: "rm -rf /".into() },
            Some("recursive delete of the filesystem root".into()),
        );
        audit.record("executor", "sleep 600", AuditEvent::CommandTimedOut { timeout_secs: 60 }, None);

        assert_eq!(audit.len(), 4);
        let commands: Vec<String> = audit.entries().into_iter().map(|e| e.command).collect();
        assert_eq!(commands, vec!["echo hi", "echo hi", "rm -rf /", "sleep 600"]);
        assert_eq!(audit.count_outcome(AuditOutcome::Success), 2);
        assert_eq!(audit.count_outcome(AuditOutcome::Denied), 1);
        assert_eq!(audit.count_outcome(AuditOutcome::Failure), 1);
    }

    #[test]
    fn entry_serializes_with_tagged_event() {
        let audit = AuditLogger::new();
        audit.record("executor", "false", AuditEvent::CommandExecuted { exit_code: 1 }, None);

        let json = serde_json::to_value(&audit.entries()[0]).unwrap();
        assert_eq!(json["component"], "executor");
        assert_eq!(json["event"]["type"], "command_executed");
        assert_eq!(json["event"]["exit_code"], 1);
    }

    #[test]
    fn sinks_see_every_entry() {
        struct Collect(Arc<Mutex<Vec<String>>>);

        impl AuditSink for Collect {
            fn record(&self, entry: &AuditEntry) {
                self.0.lock().unwrap().push(entry.command.clone());
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let audit = AuditLogger::new().with_sink(Collect(seen.clone())).with_sink(TracingSink);
        audit.record("safety_gate", "pwd", AuditEvent::CommandAllowed, None);

        assert_eq!(*seen.lock().unwrap(), vec!["pwd"]);
        assert!(format!("{audit:?}").contains("sinks: 2"));
    }
}
