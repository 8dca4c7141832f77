//! Command safety gate: admission check for model-proposed shell commands.
//!
//! The gate is a deny-list of dangerous literal fragments matched against
//! the command text. It is a best-effort filter, not a sandbox: it does not
//! parse shell grammar and a determined caller can phrase around it.
//! Anything it admits still runs with the full privileges of the process.

use crate::audit::{AuditEvent, AuditLogger};
use osgate_core::error::CommandError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Allowed,
    Denied { reason: String },
}

impl GateVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateVerdict::Allowed)
    }
}

/// One deny-list entry.
#[derive(Debug, Clone)]
struct DenyPattern {
    needle: String,
    reason: String,
    /// Match with all whitespace stripped from both sides
    compact: bool,
}

impl DenyPattern {
    fn spaced(needle: &str, reason: &str) -> Self {
        Self {
            needle: normalize(needle),
            reason: reason.into(),
            compact: false,
        }
    }

    fn compact(needle: &str, reason: &str) -> Self {
        Self {
            needle: compact(needle),
            reason: reason.into(),
            compact: true,
        }
    }

    fn matches(&self, normalized: &str, compacted: &str) -> bool {
        if self.compact {
            compacted.contains(&self.needle)
        } else {
            normalized.contains(&self.needle)
        }
    }
}

/// Lowercase and collapse whitespace runs to single spaces.
fn normalize(command: &str) -> String {
    command
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn compact(command: &str) -> String {
    command
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

fn builtin_patterns() -> Vec<DenyPattern> {
    vec![
        DenyPattern::spaced("rm -rf /", "recursive delete from the filesystem root"),
        DenyPattern::spaced("rm -fr /", "recursive delete from the filesystem root"),
        DenyPattern::spaced("rm -rf ~", "recursive delete of the home directory"),
        DenyPattern::spaced("rm -rf *", "recursive wildcard delete"),
        DenyPattern::spaced("rm -rf .", "recursive delete of the working directory"),
        DenyPattern::spaced("rm --no-preserve-root", "root protection disabled"),
        DenyPattern::compact(":(){:|:&};:", "fork bomb"),
        DenyPattern::spaced("mkfs", "filesystem format"),
        DenyPattern::spaced("dd if=", "raw block device copy"),
        DenyPattern::spaced("> /dev/sd", "write to a raw disk device"),
        DenyPattern::spaced("of=/dev/sd", "write to a raw disk device"),
        DenyPattern::spaced("chmod -r 777 /", "recursive permission change from root"),
        DenyPattern::spaced("chown -r", "recursive ownership change"),
        DenyPattern::spaced("shutdown", "host power control"),
        DenyPattern::spaced("reboot", "host power control"),
        DenyPattern::spaced("halt", "host power control"),
        DenyPattern::spaced("poweroff", "host power control"),
        DenyPattern::spaced("init 0", "host power control"),
        DenyPattern::spaced("kill -9 -1", "kill every process"),
        DenyPattern::spaced("format c:", "filesystem format"),
        DenyPattern::spaced("del /s /q c:\\", "recursive delete of the system drive"),
    ]
}

/// The command safety gate.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    patterns: Vec<DenyPattern>,
    audit: Option<Arc<AuditLogger>>,
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyGate {
    /// A gate carrying the built-in deny list.
    pub fn new() -> Self {
        Self {
            patterns: builtin_patterns(),
            audit: None,
        }
    }

    /// Add operator-configured fragments on top of the built-in list.
    pub fn with_extra_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.trim().is_empty() {
                continue;
            }
            self.patterns
                .push(DenyPattern::spaced(pattern, "matches a configured deny pattern"));
        }
        self
    }

    /// Record every verdict in `audit`.
    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Number of deny patterns in force.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Check a command string against the deny list.
    pub fn check(&self, command: &str) -> GateVerdict {
        let normalized = normalize(command);
        let compacted = compact(command);

        let hit = self
            .patterns
            .iter()
            .find(|p| p.matches(&normalized, &compacted));

        match hit {
            Some(pattern) => {
                warn!(command = %command, pattern = %pattern.needle, "Command denied by safety gate");
                self.record(
                    AuditEvent::CommandDenied {
                        pattern: pattern.needle.clone(),
                    },
                    command,
                    Some(pattern.reason.clone()),
                );
                GateVerdict::Denied {
                    reason: format!("{} (matched '{}')", pattern.reason, pattern.needle),
                }
            }
            None => {
                debug!(command = %command, "Command admitted by safety gate");
                self.record(AuditEvent::CommandAllowed, command, None);
                GateVerdict::Allowed
            }
        }
    }

    /// [`check`](Self::check) as a `Result`, for callers that propagate with `?`.
    pub fn admit(&self, command: &str) -> Result<(), CommandError> {
        match self.check(command) {
            GateVerdict::Allowed => Ok(()),
            GateVerdict::Denied { reason } => Err(CommandError::Denied {
                command: command.into(),
                reason,
            }),
        }
    }

    fn record(&self, event: AuditEvent, command: &str, details: Option<String>) {
        if let Some(audit) = &self.audit {
            audit.record("safety_gate", command, event, details);
        }
    }
}
