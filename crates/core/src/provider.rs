//! Provider trait: the seam between the session loop and the inference server.
//!
//! A provider takes the system text plus the conversation history and
//! returns the assistant's reply. Every failure mode (connection refused,
//! non-2xx, malformed body, timeout) surfaces as a [`ProviderError`]; the
//! disclosure engine never sees them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::{Message, Role};

/// A single chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (llama.cpp ignores it, other servers do not)
    pub model: String,

    /// System text assembled from the active content blocks
    pub system: String,

    /// The conversation history, oldest first
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.1
}

impl ProviderRequest {
    /// Flatten system text and history into the role-tagged list most
    /// chat-completion endpoints expect.
    pub fn wire_messages(&self) -> Vec<(Role, &str)> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if !self.system.is_empty() {
            out.push((Role::System, self.system.as_str()));
        }
        out.extend(self.messages.iter().map(|m| (m.role, m.content.as_str())));
        out
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "llama.cpp").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req: ProviderRequest = serde_json::from_value(serde_json::json!({
            "model": "local",
            "system": "",
            "messages": [],
        }))
        .unwrap();
        assert!((req.temperature - 0.1).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn wire_messages_prepend_system_text() {
        let req = ProviderRequest {
            model: "local".into(),
            system: "You are an OS Agent.".into(),
            messages: vec![Message::user("hi"), Message::assistant("hello")],
            temperature: 0.1,
            max_tokens: None,
        };
        let wire = req.wire_messages();
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0], (Role::System, "You are an OS Agent."));
        assert_eq!(wire[2], (Role::Assistant, "hello"));
    }

    #[test]
    fn empty_system_text_is_omitted() {
        let req = ProviderRequest {
            model: "local".into(),
            system: String::new(),
            messages: vec![Message::user("hi")],
            temperature: 0.1,
            max_tokens: None,
        };
        assert_eq!(req.wire_messages(), vec![(Role::User, "hi")]);
    }
}
