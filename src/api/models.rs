use std::error::Error as StdError;
use std::fmt;

use tracing::{debug, warn};

use crate::api::ModelsResponse;

/// Failure modes of a model-list request. These never leave this module:
/// [`list_model_ids`] logs them and reports an empty list instead.
#[derive(Debug)]
pub enum ModelListError {
    Request(reqwest::Error),
    Status { status: u16, body: String },
    Decode(reqwest::Error),
}

impl fmt::Display for ModelListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelListError::Request(err) => write!(f, "model list request failed: {err}"),
            ModelListError::Status { status, body } => {
                write!(f, "model list request failed with status {status}: {body}")
            }
            ModelListError::Decode(err) => write!(f, "unexpected model list response: {err}"),
        }
    }
}

impl StdError for ModelListError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ModelListError::Request(err) | ModelListError::Decode(err) => Some(err),
            ModelListError::Status { .. } => None,
        }
    }
}

pub async fn fetch_models(
    client: &reqwest::Client,
    models_url: &str,
    api_key: &str,
) -> Result<ModelsResponse, ModelListError> {
    let response = client
        .get(models_url)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(ModelListError::Request)?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(ModelListError::Status { status, body });
    }

    response
        .json::<ModelsResponse>()
        .await
        .map_err(ModelListError::Decode)
}

/// Fetch the model identifiers published at `models_url`.
///
/// An empty result means "unavailable", not "the provider has no models":
/// network errors, non-success statuses and malformed bodies are logged and
/// flattened into an empty list. No retry is attempted.
pub async fn list_model_ids(
    client: &reqwest::Client,
    models_url: &str,
    api_key: &str,
) -> Vec<String> {
    match fetch_models(client, models_url, api_key).await {
        Ok(models) => {
            let ids: Vec<String> = models.data.into_iter().map(|model| model.id).collect();
            debug!(url = models_url, count = ids.len(), "fetched model list");
            ids
        }
        Err(err) => {
            warn!(url = models_url, error = %err, "failed to fetch model list");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{serve_once, test_http_client};

    #[tokio::test]
    async fn list_model_ids_extracts_ids_and_sends_bearer_auth() {
        let body = r#"{"object":"list","data":[{"id":"deepseek-chat"},{"id":"deepseek-reasoner"}]}"#;
        let (url, request) = serve_once("200 OK", "application/json", body.to_string()).await;

        let ids = list_model_ids(&test_http_client(), &format!("{url}/models"), "sk-test").await;

        assert_eq!(ids, vec!["deepseek-chat", "deepseek-reasoner"]);
        let captured = request.await.expect("server task should finish");
        assert!(captured.request_line.starts_with("GET /models "));
        assert_eq!(captured.header("authorization").as_deref(), Some("Bearer sk-test"));
        assert_eq!(captured.header("accept").as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn unauthorized_response_yields_empty_list() {
        let body = r#"{"error":{"message":"invalid api key"}}"#;
        let (url, request) = serve_once("401 Unauthorized", "application/json", body.to_string()).await;

        let ids = list_model_ids(&test_http_client(), &format!("{url}/models"), "bad").await;

        assert!(ids.is_empty());
        request.await.expect("server task should finish");
    }

    #[tokio::test]
    async fn malformed_body_yields_empty_list() {
        let (url, request) = serve_once("200 OK", "application/json", r#"{"models":[]}"#.to_string()).await;

        let ids = list_model_ids(&test_http_client(), &format!("{url}/models"), "sk").await;

        assert!(ids.is_empty());
        request.await.expect("server task should finish");
    }

    #[tokio::test]
    async fn fetch_models_reports_status_and_body() {
        let (url, request) = serve_once("403 Forbidden", "text/plain", "nope".to_string()).await;

        let err = fetch_models(&test_http_client(), &format!("{url}/models"), "sk")
            .await
            .err()
            .expect("403 should be an error");

        match err {
            ModelListError::Status { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "nope");
            }
            other => panic!("expected status error, got {other}"),
        }
        request.await.expect("server task should finish");
    }
}
