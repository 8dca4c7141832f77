//! OpenAI-compatible provider implementation.
//!
//! Talks to any server exposing `/v1/chat/completions`: llama.cpp's
//! `llama-server` (the default deployment), vLLM, Ollama, or a hosted API.
//! Non-streaming only; the session loop needs whole replies to scan for
//! directives.

use async_trait::async_trait;
use osgate_core::error::ProviderError;
use osgate_core::message::Message;
use osgate_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    /// A local llama.cpp server (convenience constructor).
    pub fn llama_cpp(base_url: Option<&str>) -> Self {
        Self::new(
            "llama.cpp",
            base_url.unwrap_or("http://localhost:8080/v1"),
            None,
            Duration::from_secs(120),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert the request into OpenAI API message format.
    fn to_api_messages(request: &ProviderRequest) -> Vec<ApiMessage> {
        request
            .wire_messages()
            .into_iter()
            .map(|(role, content)| ApiMessage {
                role: role.as_str().into(),
                content: Some(content.to_string()),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }

    fn parse_response(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage,
            model: api_response.model.unwrap_or_default(),
        })
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            system_chars = request.system.len(),
            "Sending completion request"
        );

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        Self::parse_response(api_response)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(map_transport_error)?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use osgate_core::message::Role;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(system: &str, messages: Vec<Message>) -> ProviderRequest {
        ProviderRequest {
            model: "local".into(),
            system: system.into(),
            messages,
            temperature: 0.1,
            max_tokens: None,
        }
    }

    fn provider(server: &MockServer) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("test", format!("{}/v1", server.uri()), None, Duration::from_secs(5))
    }

    #[test]
    fn llama_cpp_constructor() {
        let provider = OpenAiCompatProvider::llama_cpp(None);
        assert_eq!(provider.name(), "llama.cpp");
        assert_eq!(provider.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let provider = OpenAiCompatProvider::llama_cpp(Some("http://gpu:8080/v1/"));
        assert_eq!(provider.base_url(), "http://gpu:8080/v1");
    }

    #[test]
    fn message_conversion_puts_system_first() {
        let req = request("You are an OS Agent.", vec![Message::user("Hello")]);
        let api_messages = OpenAiCompatProvider::to_api_messages(&req);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
        assert_eq!(api_messages[1].content.as_deref(), Some("Hello"));
    }

    #[test]
    fn body_includes_max_tokens_only_when_set() {
        let mut req = request("", vec![Message::user("hi")]);
        let body = OpenAiCompatProvider::request_body(&req);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["stream"], false);

        req.max_tokens = Some(256);
        let body = OpenAiCompatProvider::request_body(&req);
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn parse_response_without_model_or_usage() {
        let data = r#"{"choices":[{"message":{"role":"assistant","content":"FINISH: done"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let response = OpenAiCompatProvider::parse_response(parsed).unwrap();
        assert_eq!(response.message.content, "FINISH: done");
        assert_eq!(response.message.role, Role::Assistant);
        assert!(response.usage.is_none());
    }

    #[test]
    fn empty_choices_is_malformed() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"model":"m","choices":[]}"#).unwrap();
        let err = OpenAiCompatProvider::parse_response(parsed).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    // ── Mock server ──────────────────────────────────────────────────

    #[tokio::test]
    async fn complete_posts_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "local",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "list files"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "qwen",
                "choices": [{"message": {"role": "assistant", "content": "RUN_COMMAND: [\"ls\"]"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider(&server)
            .complete(request("sys", vec![Message::user("list files")]))
            .await
            .unwrap();
        assert_eq!(response.message.content, "RUN_COMMAND: [\"ls\"]");
        assert_eq!(response.model, "qwen");
        assert_eq!(response.usage.unwrap().total_tokens, 16);
    }

    #[tokio::test]
    async fn api_key_is_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-local"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "FINISH: ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(
            "test",
            format!("{}/v1", server.uri()),
            Some("sk-local".into()),
            Duration::from_secs(5),
        );
        let response = provider.complete(request("", vec![Message::user("hi")])).await.unwrap();
        assert_eq!(response.message.content, "FINISH: ok");
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string(r#"{"error":"loading model"}"#))
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(request("", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        match err {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 503);
                assert!(message.contains("loading model"));
            }
            other => panic!("Expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(request("", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(ref m) if m.starts_with("Failed to parse response")));
    }

    #[tokio::test]
    async fn health_check_lists_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        assert!(provider(&server).health_check().await.unwrap());
    }

    #[tokio::test]
    async fn health_check_reports_failed_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(!provider(&server).health_check().await.unwrap());
    }

    #[tokio::test]
    async fn closed_port_is_network_error() {
        // Pooled mock servers stay up after drop; a released port does not.
        let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let base = format!("http://{addr}/v1");

        let provider = OpenAiCompatProvider::new("test", base, None, Duration::from_secs(5));
        let err = provider
            .complete(request("", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
        assert!(provider.health_check().await.is_err());
    }
}
