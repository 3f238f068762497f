use crate::core::events::NoticeLevel;
use crate::core::message::Message;
use crate::core::persona::builtin_persona;
use crate::core::persona::PersonaId;
use crate::core::session::Session;
use crate::utils::logging::TranscriptLog;

/// Everything an interactive front-end mutates in response to user input.
pub struct App {
    pub session: Session,
    pub transcript: TranscriptLog,
}

impl App {
    pub fn new(session: Session, transcript: TranscriptLog) -> Self {
        Self {
            session,
            transcript,
        }
    }

    /// Append one conversation turn to the transcript, if logging is on.
    /// Write failures are reported as a notice and never interrupt the chat.
    pub fn record(&self, persona: PersonaId, message: &Message) {
        let speaker = if message.is_user() {
            "你:".to_string()
        } else {
            format!("{}:", builtin_persona(persona).name)
        };
        if let Err(err) = self.transcript.log_message(&speaker, &message.content) {
            self.session
                .notify(NoticeLevel::Error, format!("Failed to write to log: {err}"));
        }
    }
}
