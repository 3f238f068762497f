//! Request assembly and completion invocation.
//!
//! Every request is the persona's system prompt followed by that persona's
//! entire history. Nothing is truncated or summarized.

use crate::api::{ChatMessage, ChatRequest};
use crate::core::backend::ChatBackend;
use crate::core::chat_stream::StreamMessage;
use crate::core::error::CompletionError;
use crate::core::message::{Message, Role};
use crate::core::persona::Persona;

pub const TEMPERATURE: f32 = 0.7;
pub const MAX_TOKENS: u32 = 1024;

pub fn assemble_messages(persona: &Persona, history: &[Message]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage {
        role: Role::System.as_str().to_string(),
        content: persona.prompt.clone(),
    });
    messages.extend(history.iter().map(Message::to_api));
    messages
}

pub fn build_request(
    model: &str,
    messages: Vec<ChatMessage>,
    stream: bool,
) -> Result<ChatRequest, CompletionError> {
    let model = model.trim();
    if model.is_empty() {
        return Err(CompletionError::InvalidRequest(
            "no model selected".to_string(),
        ));
    }
    if messages.is_empty() {
        return Err(CompletionError::InvalidRequest(
            "no messages to send".to_string(),
        ));
    }

    Ok(ChatRequest {
        model: model.to_string(),
        messages,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
        stream,
    })
}

/// Run `request` against `backend`.
///
/// In streaming mode each non-empty fragment is appended to a running buffer
/// and `on_progress` sees the whole buffer after every append. The returned
/// text is identical to what blocking mode yields for the same reply.
pub async fn run_request<F>(
    backend: &dyn ChatBackend,
    request: ChatRequest,
    mut on_progress: F,
) -> Result<String, CompletionError>
where
    F: FnMut(&str) + Send,
{
    if !request.stream {
        return backend.complete(request).await;
    }

    let mut rx = backend.stream(request);
    let mut buffer = String::new();
    while let Some(message) = rx.recv().await {
        match message {
            StreamMessage::Chunk(fragment) if fragment.is_empty() => {}
            StreamMessage::Chunk(fragment) => {
                buffer.push_str(&fragment);
                on_progress(&buffer);
            }
            StreamMessage::Error(err) => return Err(err),
            StreamMessage::End => return Ok(buffer),
        }
    }
    // The producer went away without finishing the reply.
    Err(CompletionError::Transport(
        "stream ended unexpectedly".to_string(),
    ))
}

/// Assemble and run one completion in a single step.
pub async fn complete<F>(
    backend: &dyn ChatBackend,
    model: &str,
    messages: Vec<ChatMessage>,
    stream: bool,
    on_progress: F,
) -> Result<String, CompletionError>
where
    F: FnMut(&str) + Send,
{
    let request = build_request(model, messages, stream)?;
    run_request(backend, request, on_progress).await
}
