//! Configuration loading, validation, and management for osgate.
//!
//! Loads configuration from `~/.osgate/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use osgate_core::block::Priority;
use osgate_core::registry::SourceSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.osgate/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the OpenAI-compatible inference server
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Optional bearer token (llama.cpp needs none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name sent with each request
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature (low for rule adherence)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Optional cap on generated tokens per reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Inference request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Content sources and the disclosure budget
    #[serde(default)]
    pub context: ContextConfig,

    /// Command execution settings
    #[serde(default)]
    pub commands: CommandsConfig,

    /// Session loop settings
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_api_url() -> String {
    "http://localhost:8080/v1".into()
}
fn default_model() -> String {
    "local".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_request_timeout() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("context", &self.context)
            .field("commands", &self.commands)
            .field("session", &self.session)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Directory holding the markdown sources
    #[serde(default = "default_context_dir")]
    pub dir: PathBuf,

    /// Token ceiling for all active blocks together
    #[serde(default = "default_budget")]
    pub budget: u64,

    /// How many analyzer candidates to load per turn
    #[serde(default = "default_max_loads_per_turn")]
    pub max_loads_per_turn: usize,

    /// Also pick up extra `*.md` files carrying frontmatter
    #[serde(default)]
    pub extensions: bool,

    /// The fixed set of logical sources
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceSpec>,
}

fn default_context_dir() -> PathBuf {
    PathBuf::from("context_files")
}
fn default_budget() -> u64 {
    8000
}
fn default_max_loads_per_turn() -> usize {
    2
}

/// The personality files every deployment ships with.
pub fn default_sources() -> Vec<SourceSpec> {
    vec![
        SourceSpec::new("identity", "IDENTITY.md", 1, &["name", "identity", "core", "who", "what"]),
        SourceSpec::new("agent", "AGENT.md", 2, &["behavior", "response", "interaction", "guidelines"]),
        SourceSpec::new("soul", "SOUL.md", 3, &["values", "ethics", "beliefs", "principles", "philosophy"]),
        SourceSpec::new("tools", "TOOLS.md", 4, &["tool", "function", "capability", "can", "execute"]),
        SourceSpec::new("heartbeat", "HEARTBEAT.md", 5, &["emotion", "feel", "empathy", "mood", "emotional"]),
        SourceSpec::new("skill", "SKILL.md", 6, &["learn", "skill", "ability", "training"]).optional(),
    ]
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            dir: default_context_dir(),
            budget: default_budget(),
            max_loads_per_turn: default_max_loads_per_turn(),
            extensions: false,
            sources: default_sources(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Whether RUN_COMMAND directives are honored at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Wall-clock limit per command
    #[serde(default = "default_command_timeout")]
    pub timeout_secs: u64,

    /// Substrings denied in addition to the built-in list
    #[serde(default)]
    pub extra_deny_patterns: Vec<String>,
}

fn default_command_timeout() -> u64 {
    60
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_command_timeout(),
            extra_deny_patterns: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on model calls per goal
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    20
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.osgate/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `OSGATE_API_URL`
    /// - `OSGATE_MODEL`
    /// - `OSGATE_CONTEXT_DIR`
    /// - `OSGATE_BUDGET`
    /// - `OSGATE_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(url) = lookup("OSGATE_API_URL") {
            self.api_url = url;
        }
        if let Some(model) = lookup("OSGATE_MODEL") {
            self.model = model;
        }
        if let Some(dir) = lookup("OSGATE_CONTEXT_DIR") {
            self.context.dir = PathBuf::from(dir);
        }
        if let Some(budget) = lookup("OSGATE_BUDGET") {
            self.context.budget = budget.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("OSGATE_BUDGET must be a non-negative integer, got '{budget}'"))
            })?;
        }
        if self.api_key.is_none() {
            self.api_key = lookup("OSGATE_API_KEY");
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".osgate")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.request_timeout_secs == 0 || self.commands.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than zero".into(),
            ));
        }

        let mut names = HashSet::new();
        for source in &self.context.sources {
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate context source '{}'",
                    source.name
                )));
            }
            if source.priority == Priority(0) {
                return Err(ConfigError::ValidationError(format!(
                    "context source '{}' has priority 0; classes start at 1 (core)",
                    source.name
                )));
            }
            if source.priority.is_core() && !source.required {
                return Err(ConfigError::ValidationError(format!(
                    "core context source '{}' must be required",
                    source.name
                )));
            }
        }

        if !self.context.sources.iter().any(|s| s.priority.is_core()) {
            return Err(ConfigError::ValidationError(
                "at least one context source must have priority 1 (core)".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            request_timeout_secs: default_request_timeout(),
            context: ContextConfig::default(),
            commands: CommandsConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for osgate_core::error::Error {
    fn from(e: ConfigError) -> Self {
        Self::Config { message: e.to_string() }
    }
}
