//! Sub-command implementations and the wiring they share.

pub mod chat;
pub mod check;
pub mod contexts;
pub mod onboard;
pub mod run;
pub mod status;

use osgate_config::AppConfig;
use osgate_core::error::{Error, Result};
use osgate_core::registry::ContentRegistry;
use osgate_core::source::load_directory;
use osgate_security::{AuditLogger, TracingSink};
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line flags that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub context_dir: Option<PathBuf>,
    pub budget: Option<u64>,
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.context_dir {
            config.context.dir = dir.clone();
        }
        if let Some(budget) = self.budget {
            config.context.budget = budget;
        }
    }
}

/// Load `~/.osgate/config.toml` (plus env) and apply the flags on top.
pub fn load_config(overrides: &Overrides) -> Result<AppConfig> {
    let mut config = AppConfig::load()?;
    overrides.apply(&mut config);
    Ok(config)
}

/// Build the registry from the configured context directory.
pub fn load_registry(config: &AppConfig) -> Result<Arc<ContentRegistry>> {
    let registry = load_directory(&config.context.dir, &config.context.sources, config.context.extensions)?;
    Ok(Arc::new(registry))
}

/// What the user can do about `err`.
pub fn hint(err: &Error) -> &'static str {
    match err {
        Error::Registry(_) => "Run `osgate onboard` to create the starter context files, or pass --context-dir.",
        Error::Config { .. } => "Fix ~/.osgate/config.toml or the OSGATE_* variables, or delete the file and run `osgate onboard`.",
        Error::InferenceUnavailable(_) => "Is llama-server running? Check api_url with `osgate status`.",
    }
}

/// An audit log that also mirrors every entry to the tracing output.
pub fn audit_logger() -> Arc<AuditLogger> {
    Arc::new(AuditLogger::new().with_sink(TracingSink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let mut config = AppConfig::default();
        let overrides = Overrides {
            context_dir: Some(PathBuf::from("/srv/context")),
            budget: Some(1200),
        };
        overrides.apply(&mut config);
        assert_eq!(config.context.dir, PathBuf::from("/srv/context"));
        assert_eq!(config.context.budget, 1200);
    }

    #[test]
    fn empty_overrides_keep_config() {
        let mut config = AppConfig::default();
        Overrides::default().apply(&mut config);
        assert_eq!(config.context.dir, PathBuf::from("context_files"));
        assert_eq!(config.context.budget, 8000);
    }

    #[test]
    fn missing_context_dir_explains_itself() {
        let mut config = AppConfig::default();
        config.context.dir = PathBuf::from("/nonexistent/osgate/context");
        let err = load_registry(&config).unwrap_err();
        assert!(matches!(err, Error::Registry(_)));
        assert!(err.to_string().contains("identity"));
        assert!(hint(&err).contains("osgate onboard"));
    }

    #[test]
    fn boxed_errors_still_get_a_hint() {
        let err: Box<dyn std::error::Error> = Box::new(Error::Config {
            message: "temperature must be between 0.0 and 2.0".into(),
        });
        let hint = err.downcast_ref::<Error>().map(hint).unwrap();
        assert!(hint.contains("config.toml"));
    }
}
