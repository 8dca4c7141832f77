//! Shell executor: run an admitted command under a timeout.
//!
//! Commands arrive as an argv list and are spawned directly, without a
//! shell in between, so there is no globbing, piping or variable expansion.
//! A command that outlives its timeout is killed and reported as
//! [`CommandError::Timeout`], distinct from a spawn failure.

use async_trait::async_trait;
use osgate_core::error::CommandError;
use osgate_security::audit::{AuditEvent, AuditLogger};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// What a finished command left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Process exit code; -1 when terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The text fed back to the model after a run.
    pub fn to_feedback(&self) -> String {
        format!(
            "COMMAND RESULT:\nExit Code: {}\nSTDOUT: {}\nSTDERR: {}",
            self.exit_code, self.stdout, self.stderr
        )
    }
}

/// Runs an argv list to completion or timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[String]) -> Result<CommandOutput, CommandError>;
}

/// Process-backed [`CommandRunner`].
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    timeout: Duration,
    working_dir: Option<std::path::PathBuf>,
    audit: Option<Arc<AuditLogger>>,
}

impl ShellExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            working_dir: None,
            audit: None,
        }
    }

    /// Spawn commands in `dir` instead of the process working directory.
    pub fn with_working_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Record every execution outcome in `audit`.
    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn record(&self, event: AuditEvent, command: &str, details: Option<String>) {
        if let Some(audit) = &self.audit {
            audit.record("executor", command, event, details);
        }
    }
}

#[async_trait]
impl CommandRunner for ShellExecutor {
    async fn run(&self, argv: &[String]) -> Result<CommandOutput, CommandError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| CommandError::InvalidArguments("Empty command".into()))?;
        let command = argv.join(" ");

        debug!(command = %command, timeout_secs = self.timeout.as_secs(), "Executing command");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            warn!(command = %command, error = %e, "Command failed to start");
            self.record(AuditEvent::CommandFailed, &command, Some(e.to_string()));
            CommandError::ExecutionFailed {
                command: command.clone(),
                reason: e.to_string(),
            }
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                self.record(AuditEvent::CommandFailed, &command, Some(e.to_string()));
                return Err(CommandError::ExecutionFailed {
                    command,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                let timeout_secs = self.timeout.as_secs();
                warn!(command = %command, timeout_secs, "Command timed out");
                self.record(AuditEvent::CommandTimedOut { timeout_secs }, &command, None);
                return Err(CommandError::Timeout { command, timeout_secs });
            }
        };

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.success() {
            warn!(command = %command, exit_code = result.exit_code, "Command exited non-zero");
        }
        self.record(
            AuditEvent::CommandExecuted {
                exit_code: result.exit_code,
            },
            &command,
            None,
        );

        Ok(result)
    }
}
