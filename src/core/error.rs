use std::error::Error as StdError;
use std::fmt;

use crate::core::builtin_providers::ProviderId;
use crate::core::persona::PersonaId;

/// Building a provider-bound chat client was rejected.
#[derive(Debug)]
pub enum ProviderInitError {
    EmptyCredential(ProviderId),
    HttpClient(reqwest::Error),
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderInitError::EmptyCredential(provider) => {
                write!(f, "cannot create a {provider} client without an API key")
            }
            ProviderInitError::HttpClient(err) => {
                write!(f, "failed to initialise HTTP client: {err}")
            }
        }
    }
}

impl StdError for ProviderInitError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ProviderInitError::HttpClient(err) => Some(err),
            ProviderInitError::EmptyCredential(_) => None,
        }
    }
}

/// A chat completion could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The request could not be assembled (e.g. no model selected).
    InvalidRequest(String),
    /// The request never produced a usable HTTP response.
    Transport(String),
    /// The provider answered with an error payload, already formatted.
    Api(String),
    MalformedResponse(String),
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::InvalidRequest(reason) => write!(f, "invalid request: {reason}"),
            CompletionError::Transport(reason) => write!(f, "{reason}"),
            CompletionError::Api(formatted) => write!(f, "{formatted}"),
            CompletionError::MalformedResponse(reason) => {
                write!(f, "malformed response: {reason}")
            }
        }
    }
}

impl StdError for CompletionError {}

/// Reasons a session action was refused. Every variant leaves the session
/// exactly as it was before the action.
#[derive(Debug)]
pub enum SessionError {
    CredentialMissing { provider: ProviderId, console_url: String },
    EmptyMessage,
    InFlight(PersonaId),
    ProviderInit(ProviderInitError),
    ModelListUnsupported(ProviderId),
    UnknownModel { provider: ProviderId, model: String },
    Completion(CompletionError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::CredentialMissing {
                provider,
                console_url,
            } => write!(
                f,
                "No API key set for {provider}. Use /key <api-key> first (keys are issued at {console_url})."
            ),
            SessionError::EmptyMessage => write!(f, "Nothing to send."),
            SessionError::InFlight(persona) => write!(
                f,
                "Still waiting for {persona} to finish replying; try again once the response completes."
            ),
            SessionError::ProviderInit(err) => write!(f, "Failed to initialise API client: {err}"),
            SessionError::ModelListUnsupported(provider) => write!(
                f,
                "{provider} does not publish a model list; pick one of the built-in models with /model."
            ),
            SessionError::UnknownModel { provider, model } => {
                write!(f, "Model '{model}' is not available for {provider}.")
            }
            SessionError::Completion(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for SessionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SessionError::ProviderInit(err) => Some(err),
            SessionError::Completion(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProviderInitError> for SessionError {
    fn from(err: ProviderInitError) -> Self {
        SessionError::ProviderInit(err)
    }
}

impl From<CompletionError> for SessionError {
    fn from(err: CompletionError) -> Self {
        SessionError::Completion(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_missing_points_at_console() {
        let err = SessionError::CredentialMissing {
            provider: ProviderId::DeepSeek,
            console_url: "https://platform.deepseek.com/".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("deepseek"));
        assert!(text.contains("https://platform.deepseek.com/"));
    }

    #[test]
    fn provider_init_errors_chain_their_source() {
        let err = SessionError::from(ProviderInitError::EmptyCredential(ProviderId::OpenAi));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("without an API key"));
    }
}
