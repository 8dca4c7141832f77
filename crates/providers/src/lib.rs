//! LLM provider implementations for osgate.
//!
//! All providers implement the `osgate_core::Provider` trait. The gateway
//! only ever talks to one OpenAI-compatible endpoint, so "routing" is a
//! single constructor driven by configuration.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use osgate_config::AppConfig;
use osgate_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;

/// Build the inference provider described by `config`.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn Provider> {
    tracing::debug!(api_url = %config.api_url, model = %config.model, "Building provider");
    Arc::new(OpenAiCompatProvider::new(
        "llama.cpp",
        &config.api_url,
        config.api_key.clone(),
        Duration::from_secs(config.request_timeout_secs),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_provider_from_default_config() {
        let provider = build_from_config(&AppConfig::default());
        assert_eq!(provider.name(), "llama.cpp");
    }
}
