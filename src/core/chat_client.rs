use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::models::list_model_ids;
use crate::api::{ChatCompletion, ChatRequest};
use crate::core::backend::ChatBackend;
use crate::core::builtin_providers::{BuiltinProvider, ProviderId};
use crate::core::chat_stream::{format_api_error, spawn_stream, StreamMessage};
use crate::core::error::{CompletionError, ProviderInitError};
use crate::utils::url::endpoint_url;

/// HTTP chat client bound to a provider's base URL and an API key.
///
/// Construction never talks to the network; a bad key only shows up when the
/// first real request fails.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    provider: ProviderId,
    base_url: String,
    models_url: Option<String>,
    api_key: String,
}

impl ChatClient {
    pub fn new(provider: &BuiltinProvider, credential: &str) -> Result<Self, ProviderInitError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(ProviderInitError::HttpClient)?;
        Self::with_http(
            http,
            provider.id,
            &provider.base_url,
            provider.models_url.as_deref(),
            credential,
        )
    }

    /// Build a client around an existing HTTP client and explicit endpoints.
    pub fn with_http(
        http: reqwest::Client,
        provider: ProviderId,
        base_url: &str,
        models_url: Option<&str>,
        credential: &str,
    ) -> Result<Self, ProviderInitError> {
        let api_key = credential.trim();
        if api_key.is_empty() {
            return Err(ProviderInitError::EmptyCredential(provider));
        }

        Ok(Self {
            http,
            provider,
            base_url: base_url.to_string(),
            models_url: models_url.map(str::to_string),
            api_key: api_key.to_string(),
        })
    }

    fn chat_url(&self) -> String {
        endpoint_url(&self.base_url, "chat/completions")
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, CompletionError> {
        debug!(provider = %self.provider, model = %request.model, "sending chat completion");
        let response = self
            .http
            .post(self.chat_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|err| CompletionError::Transport(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(CompletionError::Api(format_api_error(&error_text)));
        }

        let completion = response
            .json::<ChatCompletion>()
            .await
            .map_err(|err| CompletionError::MalformedResponse(err.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| {
                CompletionError::MalformedResponse("response contained no choices".to_string())
            })
    }

    fn stream(&self, request: ChatRequest) -> mpsc::UnboundedReceiver<StreamMessage> {
        spawn_stream(
            self.http.clone(),
            self.chat_url(),
            self.api_key.clone(),
            request,
        )
    }

    async fn list_models(&self) -> Vec<String> {
        match &self.models_url {
            Some(url) => list_model_ids(&self.http, url, &self.api_key).await,
            None => {
                debug!(provider = %self.provider, "provider has no model list endpoint");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatMessage;
    use crate::utils::test_utils::{serve_once, test_http_client};

    fn client_for(base_url: &str) -> ChatClient {
        ChatClient::with_http(
            test_http_client(),
            ProviderId::DeepSeek,
            base_url,
            Some(&format!("{base_url}/models")),
            "sk-test",
        )
        .expect("client should build")
    }

    fn request(stream: bool) -> ChatRequest {
        ChatRequest {
            model: "deepseek-chat".to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "prompt".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: "你好".to_string(),
                },
            ],
            temperature: 0.7,
            max_tokens: 1024,
            stream,
        }
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<StreamMessage>) -> Vec<StreamMessage> {
        let mut messages = Vec::new();
        while let Some(message) = rx.recv().await {
            let done = message == StreamMessage::End;
            messages.push(message);
            if done {
                break;
            }
        }
        messages
    }

    #[tokio::test]
    async fn blocking_completion_posts_request_and_returns_content() {
        let body = r#"{"id":"c1","choices":[{"index":0,"message":{"role":"assistant","content":"你好呀"},"finish_reason":"stop"}]}"#;
        let (url, captured) = serve_once("200 OK", "application/json", body.to_string()).await;

        let reply = client_for(&url)
            .complete(request(false))
            .await
            .expect("completion should succeed");
        assert_eq!(reply, "你好呀");

        let captured = captured.await.expect("server task should finish");
        assert!(captured.request_line.starts_with("POST /chat/completions "));
        assert_eq!(captured.header("authorization").as_deref(), Some("Bearer sk-test"));
        let sent: serde_json::Value =
            serde_json::from_slice(&captured.body).expect("request body is JSON");
        assert_eq!(sent["model"], "deepseek-chat");
        assert_eq!(sent["max_tokens"], 1024);
        assert_eq!(sent["stream"], false);
        assert_eq!(sent["messages"][0]["role"], "system");
        assert_eq!(sent["messages"][1]["content"], "你好");
    }

    #[tokio::test]
    async fn blocking_completion_surfaces_api_errors() {
        let body = r#"{"error":{"message":"Authentication Fails"}}"#;
        let (url, captured) = serve_once("401 Unauthorized", "application/json", body.to_string()).await;

        let err = client_for(&url)
            .complete(request(false))
            .await
            .expect_err("401 should fail");
        match err {
            CompletionError::Api(text) => assert!(text.starts_with("API Error: Authentication Fails")),
            other => panic!("expected api error, got {other:?}"),
        }
        captured.await.expect("server task should finish");
    }

    #[tokio::test]
    async fn blocking_completion_rejects_empty_choices() {
        let (url, captured) = serve_once("200 OK", "application/json", r#"{"choices":[]}"#.to_string()).await;

        let err = client_for(&url)
            .complete(request(false))
            .await
            .expect_err("no choices should fail");
        assert!(matches!(err, CompletionError::MalformedResponse(_)));
        captured.await.expect("server task should finish");
    }

    #[tokio::test]
    async fn streamed_completion_yields_fragments_in_order() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"你好\"}}]}\n\n",
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"呀\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        let (url, captured) = serve_once("200 OK", "text/event-stream", body.to_string()).await;

        let messages = drain(client_for(&url).stream(request(true))).await;
        assert_eq!(
            messages,
            vec![
                StreamMessage::Chunk(String::new()),
                StreamMessage::Chunk("你好".to_string()),
                StreamMessage::Chunk("呀".to_string()),
                StreamMessage::End,
            ]
        );

        let captured = captured.await.expect("server task should finish");
        let sent: serde_json::Value =
            serde_json::from_slice(&captured.body).expect("request body is JSON");
        assert_eq!(sent["stream"], true);
    }

    #[tokio::test]
    async fn streamed_completion_reports_http_failures() {
        let (url, captured) = serve_once("500 Internal Server Error", "text/plain", "boom".to_string()).await;

        let messages = drain(client_for(&url).stream(request(true))).await;
        assert_eq!(
            messages,
            vec![
                StreamMessage::Error(CompletionError::Api("API Error:\n```\nboom\n```".to_string())),
                StreamMessage::End,
            ]
        );
        captured.await.expect("server task should finish");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let err = client_for(&format!("http://{addr}"))
            .complete(request(false))
            .await
            .expect_err("closed port should fail");
        assert!(matches!(err, CompletionError::Transport(_)));
    }

    #[test]
    fn blank_credentials_are_rejected() {
        let result = ChatClient::with_http(
            test_http_client(),
            ProviderId::SiliconFlow,
            "https://api.siliconflow.cn/v1",
            None,
            "",
        );
        assert!(matches!(
            result,
            Err(ProviderInitError::EmptyCredential(ProviderId::SiliconFlow))
        ));
    }
}
