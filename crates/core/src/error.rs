//! Error types for the osgate domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for the failures that end a command.
#[derive(Debug, Error)]
pub enum Error {
    // --- Registry errors (fatal at startup) ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Inference errors (fatal to the current session) ---
    #[error("Inference unavailable: {0}")]
    InferenceUnavailable(#[from] ProviderError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Required source '{name}' not found at {}", path.display())]
    MissingSource { name: String, path: PathBuf },

    #[error("Failed to read source at {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("Duplicate content block: {0}")]
    DuplicateBlock(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Unknown content block: {0}")]
    UnknownContent(String),

    #[error("Not enough budget to load '{name}' ({cost} needed, {used}/{budget} used)")]
    BudgetExceeded {
        name: String,
        cost: u64,
        used: u64,
        budget: u64,
    },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Command denied: {command}: {reason}")]
    Denied { command: String, reason: String },

    #[error("Command timed out: {command} after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("Command execution failed: {command}: {reason}")]
    ExecutionFailed { command: String, reason: String },

    #[error("Invalid command arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_as_inference_unavailable() {
        let err = Error::from(ProviderError::ApiError {
            status_code: 503,
            message: "loading model".into(),
        });
        assert!(err.to_string().starts_with("Inference unavailable"));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn budget_error_displays_numbers() {
        let err = CacheError::BudgetExceeded {
            name: "soul".into(),
            cost: 40,
            used: 90,
            budget: 100,
        };
        let text = err.to_string();
        assert!(text.contains("soul"));
        assert!(text.contains("40 needed"));
        assert!(text.contains("90/100"));
    }

    #[test]
    fn missing_source_names_the_path() {
        let err = Error::from(RegistryError::MissingSource {
            name: "identity".into(),
            path: PathBuf::from("context_files/IDENTITY.md"),
        });
        assert!(matches!(err, Error::Registry(RegistryError::MissingSource { .. })));
        assert!(err.to_string().contains("context_files/IDENTITY.md"));
    }

    #[test]
    fn command_timeout_is_distinct_from_failure() {
        let timeout = CommandError::Timeout {
            command: "sleep 100".into(),
            timeout_secs: 60,
        };
        assert!(timeout.to_string().contains("timed out"));
        assert_ne!(
            timeout,
            CommandError::ExecutionFailed {
                command: "sleep 100".into(),
                reason: "timed out".into(),
            }
        );
    }
}
