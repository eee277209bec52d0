//! Client for a hosted chat completion deployment

use super::models::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::auth::AuthStrategy;
use crate::error::{GatewayError, Result};
use crate::network::{HttpClient, OutboundRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Anything that turns an ordered list of messages into a reply
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Chat completions against an OpenAI-style deployment endpoint
pub struct CompletionClient {
    client: HttpClient,
    endpoint: String,
    deployment: String,
    api_version: String,
    auth: Arc<dyn AuthStrategy>,
    timeout: Option<Duration>,
}

impl CompletionClient {
    pub fn new(
        client: HttpClient,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        auth: Arc<dyn AuthStrategy>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
            auth,
            timeout: None,
        }
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint.trim_end_matches('/'),
            self.deployment
        )
    }
}

#[async_trait]
impl CompletionService for CompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let start = Instant::now();
        let body = serde_json::to_value(ChatCompletionRequest {
            model: &self.deployment,
            messages,
        })
        .map_err(|e| GatewayError::Unexpected(e.into()))?;

        let mut request = OutboundRequest::post("completion", self.completions_url())
            .param("api-version", &self.api_version)
            .json(body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let request = self.auth.authorize(request).await?;

        let response = self.client.execute(request).await?.error_for_status()?;
        let parsed: ChatCompletionResponse = response.json()?;

        let reply = parsed
            .first_content()
            .ok_or_else(|| GatewayError::MalformedResponse {
                service: "completion",
                reason: "response has no message content".to_string(),
            })?;

        info!(
            "Completion from {} ({} chars) in {:?}",
            self.deployment,
            reply.len(),
            start.elapsed()
        );

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiKeyAuth;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CompletionClient {
        CompletionClient::new(
            HttpClient::new().unwrap(),
            format!("{}/", server.uri()),
            "gpt-4o",
            "2024-02-01",
            Arc::new(ApiKeyAuth::new("openai-key")),
        )
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt-4o/chat/completions"))
            .and(query_param("api-version", "2024-02-01"))
            .and(header("api-key", "openai-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "You are a helpful assistant."},
                    {"role": "user", "content": "What is the capital of France?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Paris."}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server)
            .complete(&[
                ChatMessage::system("You are a helpful assistant."),
                ChatMessage::user("What is the capital of France?"),
            ])
            .await
            .unwrap();

        assert_eq!(reply, "Paris.");
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Upstream {
                service: "completion",
                status: 429,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::MalformedResponse { .. }));
    }
}
