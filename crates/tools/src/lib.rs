//! Command execution for osgate.
//!
//! Runs commands the safety gate has already admitted, under a wall-clock
//! limit, and captures what they printed. [`CommandRunner`] is the seam the
//! session loop depends on; [`ShellExecutor`] is the process-backed
//! implementation.

pub mod shell;

pub use shell::{CommandOutput, CommandRunner, ShellExecutor};
