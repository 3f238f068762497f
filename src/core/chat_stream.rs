//! Server-sent-event decoding for streamed chat completions.
//!
//! A stream runs as its own tokio task and reports through an unbounded
//! channel, so the consumer sees a finite sequence of [`StreamMessage`]s in
//! exactly the order the provider sent them, always terminated by `End`.

use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ChatRequest, ChatResponse};
use crate::core::error::CompletionError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    /// Content delta of one chunk. May be empty; consumers skip those.
    Chunk(String),
    Error(CompletionError),
    End,
}

type StreamSender = mpsc::UnboundedSender<StreamMessage>;

fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Returns true once the stream is finished.
fn dispatch_payload(payload: &str, tx: &StreamSender) -> bool {
    if payload == "[DONE]" {
        let _ = tx.send(StreamMessage::End);
        return true;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => {
            // Chunks without choices (usage trailers, keep-alives) carry no text.
            let content = response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content);
            if let Some(content) = content {
                let _ = tx.send(StreamMessage::Chunk(content));
            }
            false
        }
        Err(_) if payload.trim().is_empty() => false,
        Err(_) => {
            let _ = tx.send(StreamMessage::Error(CompletionError::Api(format_api_error(
                payload,
            ))));
            let _ = tx.send(StreamMessage::End);
            true
        }
    }
}

fn process_sse_line(line: &str, tx: &StreamSender) -> bool {
    data_payload(line)
        .map(|payload| dispatch_payload(payload, tx))
        .unwrap_or(false)
}

/// Splits a byte stream into complete lines. Bytes are only decoded once a
/// full line is present, so multi-byte characters may straddle chunks.
#[derive(Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<Result<String, std::str::Utf8Error>> {
        let newline = memchr(b'\n', &self.bytes)?;
        let line: Vec<u8> = self.bytes.drain(..=newline).collect();
        Some(std::str::from_utf8(&line).map(|text| text.trim().to_string()))
    }

    fn take_remainder(&mut self) -> Option<String> {
        if self.bytes.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.bytes);
        String::from_utf8(rest).ok().map(|text| text.trim().to_string())
    }
}

/// Drain every complete line currently buffered. Returns true once finished.
fn drain_lines(buffer: &mut LineBuffer, tx: &StreamSender) -> bool {
    while let Some(line) = buffer.next_line() {
        match line {
            Ok(line) => {
                if process_sse_line(&line, tx) {
                    return true;
                }
            }
            Err(err) => warn!(error = %err, "skipping invalid UTF-8 line in stream"),
        }
    }
    false
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Render a provider error body for display: JSON is pretty-printed with its
/// message pulled into the headline, anything else is fenced verbatim.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value) {
                Some(summary) => format!("API Error: {summary}\n```json\n{pretty_json}\n```"),
                None => format!("API Error:\n```json\n{pretty_json}\n```"),
            };
        }
    }

    let fence = if trimmed.starts_with('<') && trimmed.ends_with('>') {
        "xml"
    } else {
        ""
    };
    format!("API Error:\n```{fence}\n{trimmed}\n```")
}

/// Start streaming `request` to `url` and return the receiving end.
pub fn spawn_stream(
    http: reqwest::Client,
    url: String,
    api_key: String,
    request: ChatRequest,
) -> mpsc::UnboundedReceiver<StreamMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        run_stream(http, url, api_key, request, &tx).await;
    });
    rx
}

async fn run_stream(
    http: reqwest::Client,
    url: String,
    api_key: String,
    request: ChatRequest,
    tx: &StreamSender,
) {
    let fail = |err: CompletionError| {
        let _ = tx.send(StreamMessage::Error(err));
        let _ = tx.send(StreamMessage::End);
    };

    debug!(url = %url, model = %request.model, "starting chat stream");
    let response = match http
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&request)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => return fail(CompletionError::Transport(format!("request failed: {err}"))),
    };

    if !response.status().is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return fail(CompletionError::Api(format_api_error(&error_text)));
    }

    let mut body = response.bytes_stream();
    let mut buffer = LineBuffer::default();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                buffer.extend(&bytes);
                if drain_lines(&mut buffer, tx) {
                    return;
                }
            }
            Err(err) => {
                return fail(CompletionError::Transport(format!(
                    "stream interrupted: {err}"
                )))
            }
        }
    }

    // A final event may arrive without a trailing newline.
    if let Some(line) = buffer.take_remainder() {
        if process_sse_line(&line, tx) {
            return;
        }
    }
    let _ = tx.send(StreamMessage::End);
}
