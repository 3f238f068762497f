use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::ChatRequest;
use crate::core::app::App;
use crate::core::backend::{BackendFactory, ChatBackend};
use crate::core::builtin_providers::{BuiltinProvider, ProviderId};
use crate::core::chat_stream::StreamMessage;
use crate::core::error::{CompletionError, ProviderInitError};
use crate::core::events::SessionEvent;
use crate::core::session::{Session, SessionInit};
use crate::utils::logging::TranscriptLog;

/// An app on the default persona and provider with transcripts off, plus
/// the receiver for everything it announces.
pub fn create_test_app() -> (App, mpsc::UnboundedReceiver<SessionEvent>) {
    let mut session = Session::new(SessionInit::default());
    let rx = session.subscribe();
    let transcript = TranscriptLog::new(None).expect("transcript without file");
    (App::new(session, transcript), rx)
}

/// One HTTP request as seen by [`serve_once`].
#[derive(Debug, Default)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }
}

async fn read_http_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let read = stream.read(&mut chunk).await.expect("read request");
        assert!(read > 0, "client closed before sending headers");
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let read = stream.read(&mut chunk).await.expect("read body");
        assert!(read > 0, "client closed before sending body");
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    CapturedRequest {
        request_line,
        headers,
        body,
    }
}

/// Accept a single connection on an ephemeral port, answer it with the
/// given status line and body, and hand back what the client sent.
pub async fn serve_once(
    status: &str,
    content_type: &str,
    body: String,
) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept connection");
        let captured = read_http_request(&mut stream).await;
        stream
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        let _ = stream.shutdown().await;
        captured
    });

    (format!("http://{addr}"), handle)
}

/// HTTP client that ignores proxy settings from the environment.
pub fn test_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("test client should build")
}

/// Scripted outcome of one completion call against a [`MockBackend`].
#[derive(Clone, Debug)]
pub enum MockReply {
    Text(String),
    Fragments(Vec<String>),
    Fail(CompletionError),
    FailAfter(Vec<String>, CompletionError),
    /// Streams the fragments, then closes the channel without `End`.
    Truncated(Vec<String>),
}

#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<ChatRequest>>,
    models: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn set_models(&self, models: &[&str]) {
        *self.models.lock().unwrap() = models.iter().map(|m| m.to_string()).collect();
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, request: ChatRequest) -> MockReply {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                MockReply::Fail(CompletionError::Transport("no scripted reply".to_string()))
            })
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, request: ChatRequest) -> Result<String, CompletionError> {
        match self.next_reply(request) {
            MockReply::Text(text) => Ok(text),
            MockReply::Fragments(fragments) | MockReply::Truncated(fragments) => {
                Ok(fragments.concat())
            }
            MockReply::Fail(err) | MockReply::FailAfter(_, err) => Err(err),
        }
    }

    fn stream(&self, request: ChatRequest) -> mpsc::UnboundedReceiver<StreamMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (fragments, failure, ends) = match self.next_reply(request) {
            MockReply::Text(text) => (vec![text], None, true),
            MockReply::Fragments(fragments) => (fragments, None, true),
            MockReply::Fail(err) => (Vec::new(), Some(err), true),
            MockReply::FailAfter(fragments, err) => (fragments, Some(err), true),
            MockReply::Truncated(fragments) => (fragments, None, false),
        };
        for fragment in fragments {
            let _ = tx.send(StreamMessage::Chunk(fragment));
        }
        if let Some(err) = failure {
            let _ = tx.send(StreamMessage::Error(err));
        }
        if ends {
            let _ = tx.send(StreamMessage::End);
        }
        rx
    }

    async fn list_models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

/// Hands out one shared [`MockBackend`] per provider and records every
/// connection attempt.
#[derive(Default)]
pub struct MockFactory {
    backends: Mutex<HashMap<ProviderId, Arc<MockBackend>>>,
    connections: Mutex<Vec<(ProviderId, String)>>,
    failing_connect: bool,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory whose every `connect` fails as if the HTTP stack broke.
    pub fn failing() -> Self {
        Self {
            failing_connect: true,
            ..Self::default()
        }
    }

    pub fn backend(&self, provider: ProviderId) -> Arc<MockBackend> {
        Arc::clone(
            self.backends
                .lock()
                .unwrap()
                .entry(provider)
                .or_insert_with(|| Arc::new(MockBackend::new())),
        )
    }

    pub fn connections(&self) -> Vec<(ProviderId, String)> {
        self.connections.lock().unwrap().clone()
    }
}

impl BackendFactory for MockFactory {
    fn connect(
        &self,
        provider: &BuiltinProvider,
        credential: &str,
    ) -> Result<Arc<dyn ChatBackend>, ProviderInitError> {
        self.connections
            .lock()
            .unwrap()
            .push((provider.id, credential.to_string()));
        if self.failing_connect {
            return Err(ProviderInitError::EmptyCredential(provider.id));
        }
        let backend: Arc<dyn ChatBackend> = self.backend(provider.id);
        Ok(backend)
    }
}
