//! Seams between the session and the chat providers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::api::ChatRequest;
use crate::core::builtin_providers::BuiltinProvider;
use crate::core::chat_client::ChatClient;
use crate::core::chat_stream::StreamMessage;
use crate::core::error::{CompletionError, ProviderInitError};

/// A chat client bound to one provider and credential.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Run `request` to completion and return the assistant's full text.
    async fn complete(&self, request: ChatRequest) -> Result<String, CompletionError>;

    /// Start a streamed completion. The receiver yields fragments in arrival
    /// order and always finishes with [`StreamMessage::End`].
    fn stream(&self, request: ChatRequest) -> mpsc::UnboundedReceiver<StreamMessage>;

    /// Model identifiers offered by the provider; empty when unavailable.
    async fn list_models(&self) -> Vec<String>;
}

/// Builds [`ChatBackend`]s for a provider and credential.
pub trait BackendFactory: Send + Sync {
    fn connect(
        &self,
        provider: &BuiltinProvider,
        credential: &str,
    ) -> Result<Arc<dyn ChatBackend>, ProviderInitError>;
}

/// Connects to the real provider endpoints over HTTPS.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpBackendFactory;

impl BackendFactory for HttpBackendFactory {
    fn connect(
        &self,
        provider: &BuiltinProvider,
        credential: &str,
    ) -> Result<Arc<dyn ChatBackend>, ProviderInitError> {
        Ok(Arc::new(ChatClient::new(provider, credential)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builtin_providers::{builtin_provider, ProviderId};

    #[test]
    fn http_factory_requires_a_credential() {
        let provider = builtin_provider(ProviderId::DeepSeek);

        let err = HttpBackendFactory
            .connect(provider, "   ")
            .err()
            .expect("blank credential must be rejected");
        assert!(matches!(
            err,
            ProviderInitError::EmptyCredential(ProviderId::DeepSeek)
        ));

        assert!(HttpBackendFactory.connect(provider, "sk-live").is_ok());
    }
}
