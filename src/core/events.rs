//! State-change notifications emitted by the session.
//!
//! The session never renders anything itself; front-ends subscribe to these
//! events and redraw from them.

use tokio::sync::mpsc;

use crate::core::builtin_providers::ProviderId;
use crate::core::message::Message;
use crate::core::persona::PersonaId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    PersonaSelected(PersonaId),
    ProviderSelected(ProviderId),
    ModelSelected(String),
    ModelsUpdated {
        provider: ProviderId,
        models: Vec<String>,
    },
    StreamingToggled(bool),
    CredentialChanged {
        present: bool,
    },
    MessageAppended {
        persona: PersonaId,
        message: Message,
    },
    /// The full text received so far for an in-progress streamed reply.
    /// `generation` is the session generation the request was made in.
    ResponseProgress {
        persona: PersonaId,
        generation: u64,
        partial: String,
    },
    HistoryReset,
    Notice {
        level: NoticeLevel,
        text: String,
    },
}

/// Cheap cloneable handle for publishing [`SessionEvent`]s.
///
/// Sending is fire-and-forget: with no subscriber, or after the subscriber
/// went away, events are dropped.
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn notice(&self, level: NoticeLevel, text: impl Into<String>) {
        self.emit(SessionEvent::Notice {
            level,
            text: text.into(),
        });
    }
}
