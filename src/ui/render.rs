//! Line-oriented terminal output driven by [`SessionEvent`]s.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::core::app::App;
use crate::core::builtin_providers::builtin_provider;
use crate::core::events::{NoticeLevel, SessionEvent};
use crate::core::message::Message;
use crate::core::persona::{builtin_persona, PersonaId};

pub struct Renderer<W: Write> {
    out: W,
    /// Bytes of each persona's in-progress reply already on screen.
    printed: HashMap<PersonaId, usize>,
    /// Set while a streamed reply is mid-line.
    open_line: Option<PersonaId>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: HashMap::new(),
            open_line: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn banner(&mut self, app: &App) -> io::Result<()> {
        let session = &app.session;
        let persona = builtin_persona(session.persona());
        let provider = session.provider_info();
        writeln!(
            self.out,
            "Chatting with {} via {} ({}). Type /help for commands.",
            persona.full_name,
            provider.display_name,
            session.active_model()
        )?;
        if !session.has_credential() {
            writeln!(
                self.out,
                "No API key set. Use /key <api-key> (keys are issued at {}).",
                provider.console_url
            )?;
        }
        self.out.flush()
    }

    fn close_line(&mut self) -> io::Result<()> {
        if self.open_line.take().is_some() {
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn write_message(&mut self, persona: PersonaId, message: &Message) -> io::Result<()> {
        if message.is_user() {
            writeln!(self.out, "你: {}", message.content)
        } else {
            writeln!(
                self.out,
                "{}: {}",
                builtin_persona(persona).name,
                message.content
            )
        }
    }

    fn progress(
        &mut self,
        app: &App,
        persona: PersonaId,
        generation: u64,
        partial: &str,
    ) -> io::Result<()> {
        // Replies to conversations cleared by a reset are never shown.
        if generation != app.session.generation() || persona != app.session.persona() {
            return Ok(());
        }
        if self.open_line.is_some_and(|open| open != persona) {
            self.close_line()?;
        }

        let printed = self.printed.entry(persona).or_insert(0);
        if *printed == 0 {
            write!(self.out, "{}: ", builtin_persona(persona).name)?;
        }
        if let Some(rest) = partial.get(*printed..) {
            write!(self.out, "{rest}")?;
        }
        *printed = partial.len();
        self.open_line = Some(persona);
        self.out.flush()
    }

    fn appended(&mut self, app: &App, persona: PersonaId, message: &Message) -> io::Result<()> {
        app.record(persona, message);
        let printed = self.printed.remove(&persona).unwrap_or(0);

        // The user's own line is already on screen.
        if message.is_user() {
            return Ok(());
        }
        if persona != app.session.persona() {
            self.close_line()?;
            let name = builtin_persona(persona).name.as_str();
            return writeln!(self.out, "[{name} replied; /persona {persona} to read it]");
        }

        let streamed_prefix = printed > 0
            && self.open_line == Some(persona)
            && message.content.is_char_boundary(printed)
            && message.content.len() >= printed;
        if streamed_prefix {
            writeln!(self.out, "{}", &message.content[printed..])?;
            self.open_line = None;
            return Ok(());
        }

        self.close_line()?;
        self.write_message(persona, message)
    }

    pub fn handle(&mut self, event: &SessionEvent, app: &App) -> io::Result<()> {
        match event {
            SessionEvent::ResponseProgress {
                persona,
                generation,
                partial,
            } => return self.progress(app, *persona, *generation, partial),
            SessionEvent::MessageAppended { persona, message } => {
                self.appended(app, *persona, message)?;
            }
            SessionEvent::PersonaSelected(persona) => {
                self.close_line()?;
                // An unfinished reply is redrawn in full after the replay.
                self.printed.remove(persona);
                let info = builtin_persona(*persona);
                writeln!(self.out, "Now chatting with {} ({persona}).", info.full_name)?;
                let history = app.session.history(*persona);
                if !history.is_empty() {
                    writeln!(self.out, "--- earlier ---")?;
                    for message in history {
                        self.write_message(*persona, message)?;
                    }
                    writeln!(self.out, "---")?;
                }
            }
            SessionEvent::ProviderSelected(provider) => {
                self.close_line()?;
                writeln!(
                    self.out,
                    "Provider: {}",
                    builtin_provider(*provider).display_name
                )?;
            }
            SessionEvent::ModelSelected(model) => {
                self.close_line()?;
                writeln!(self.out, "Model: {model}")?;
            }
            SessionEvent::ModelsUpdated { provider, models } => {
                self.close_line()?;
                writeln!(
                    self.out,
                    "Fetched {} models from {}. Use /model to list them.",
                    models.len(),
                    builtin_provider(*provider).display_name
                )?;
            }
            SessionEvent::StreamingToggled(enabled) => {
                self.close_line()?;
                let state = if *enabled { "on" } else { "off" };
                writeln!(self.out, "Streaming {state}.")?;
            }
            SessionEvent::CredentialChanged { .. } => {}
            SessionEvent::HistoryReset => {
                self.close_line()?;
                self.printed.clear();
                writeln!(self.out, "All conversations cleared.")?;
            }
            SessionEvent::Notice { level, text } => {
                self.close_line()?;
                match level {
                    NoticeLevel::Info => writeln!(self.out, "{text}")?,
                    NoticeLevel::Warning => writeln!(self.out, "warning: {text}")?,
                    NoticeLevel::Error => writeln!(self.out, "error: {text}")?,
                }
            }
        }
        self.out.flush()
    }
}
