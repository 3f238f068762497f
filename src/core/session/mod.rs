//! Per-persona conversation state and the selectors around it.
//!
//! A [`Session`] is owned by whichever loop handles user actions and is
//! passed by `&mut` to every handler. Submitting a message is split into
//! three steps so a front-end can keep handling input while a reply is
//! generated:
//!
//! 1. [`Session::begin_submit`] validates, records the user turn, and
//!    returns a [`PendingCompletion`].
//! 2. [`PendingCompletion::run`] talks to the provider and needs no access
//!    to the session, so it can be moved onto its own task.
//! 3. [`Session::finish_submit`] appends the assistant turn.
//!
//! [`Session::submit`] runs all three back to back.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::ChatRequest;
use crate::core::backend::{BackendFactory, ChatBackend};
use crate::core::builtin_providers::{builtin_provider, BuiltinProvider, ProviderId};
use crate::core::completion::{assemble_messages, build_request, run_request};
use crate::core::error::{CompletionError, SessionError};
use crate::core::events::{EventSink, NoticeLevel, SessionEvent};
use crate::core::message::Message;
use crate::core::persona::{builtin_persona, PersonaId};

/// Starting selections for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionInit {
    pub persona: PersonaId,
    pub provider: ProviderId,
    pub streaming: bool,
    pub credential: String,
    /// Models to select once they appear in a provider's list.
    pub preferred_models: HashMap<ProviderId, String>,
    pub server_ip: String,
}

impl Default for SessionInit {
    fn default() -> Self {
        Self {
            persona: PersonaId::Congyu,
            provider: ProviderId::OpenAi,
            streaming: true,
            credential: String::new(),
            preferred_models: HashMap::new(),
            server_ip: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ProviderModels {
    /// Last non-empty model list fetched with the provider's client.
    fetched: Vec<String>,
    /// The user's pick; honoured whenever it is among the available models.
    selected: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRefresh {
    Updated(usize),
    /// The provider returned nothing usable; the previous list stays.
    Unavailable,
}

/// A completion that has been validated and recorded but not yet run.
pub struct PendingCompletion {
    persona: PersonaId,
    generation: u64,
    request: ChatRequest,
    backend: Arc<dyn ChatBackend>,
    events: EventSink,
}

impl PendingCompletion {
    pub async fn run(self) -> CompletedTurn {
        let persona = self.persona;
        let generation = self.generation;
        let events = &self.events;
        let outcome = run_request(self.backend.as_ref(), self.request, |partial| {
            events.emit(SessionEvent::ResponseProgress {
                persona,
                generation,
                partial: partial.to_string(),
            })
        })
        .await;

        CompletedTurn {
            persona,
            generation,
            outcome,
        }
    }
}

pub struct CompletedTurn {
    persona: PersonaId,
    generation: u64,
    outcome: Result<String, CompletionError>,
}

impl CompletedTurn {
    pub fn persona(&self) -> PersonaId {
        self.persona
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Replied(String),
    /// The failure was recorded as a marked assistant turn.
    Failed(CompletionError),
    /// History was reset while the reply was being generated.
    Discarded,
}

pub struct Session {
    persona: PersonaId,
    provider: ProviderId,
    streaming: bool,
    credential: String,
    models: HashMap<ProviderId, ProviderModels>,
    histories: HashMap<PersonaId, Vec<Message>>,
    in_flight: HashSet<PersonaId>,
    generation: u64,
    events: EventSink,
    server_ip: String,
    started_at: DateTime<Local>,
}

impl Session {
    pub fn new(init: SessionInit) -> Self {
        let models = init
            .preferred_models
            .into_iter()
            .map(|(provider, model)| {
                let remembered = ProviderModels {
                    fetched: Vec::new(),
                    selected: Some(model),
                };
                (provider, remembered)
            })
            .collect();

        Self {
            persona: init.persona,
            provider: init.provider,
            streaming: init.streaming,
            credential: init.credential.trim().to_string(),
            models,
            histories: PersonaId::ALL.into_iter().map(|id| (id, Vec::new())).collect(),
            in_flight: HashSet::new(),
            generation: 0,
            events: EventSink::default(),
            server_ip: init.server_ip,
            started_at: Local::now(),
        }
    }

    /// Route state-change notifications to a new receiver. Any previous
    /// subscriber stops receiving events.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (sink, rx) = EventSink::channel();
        self.events = sink;
        rx
    }

    pub fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        self.events.notice(level, text);
    }

    pub fn persona(&self) -> PersonaId {
        self.persona
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn provider_info(&self) -> &'static BuiltinProvider {
        builtin_provider(self.provider)
    }

    pub fn streaming(&self) -> bool {
        self.streaming
    }

    pub fn has_credential(&self) -> bool {
        !self.credential.is_empty()
    }

    pub fn history(&self, persona: PersonaId) -> &[Message] {
        self.histories
            .get(&persona)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn active_history(&self) -> &[Message] {
        self.history(self.persona)
    }

    pub fn is_in_flight(&self, persona: PersonaId) -> bool {
        self.in_flight.contains(&persona)
    }

    pub fn has_pending(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Bumped by every [`Session::reset`]. Work started under an older
    /// generation belongs to a cleared conversation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn server_ip(&self) -> &str {
        &self.server_ip
    }

    /// Models the active provider offers right now: the fetched list, else
    /// the built-in list, else just the provider default.
    pub fn available_models(&self) -> &[String] {
        let provider = self.provider_info();
        match self.models.get(&self.provider) {
            Some(models) if !models.fetched.is_empty() => models.fetched.as_slice(),
            _ if !provider.fixed_models.is_empty() => provider.fixed_models.as_slice(),
            _ => std::slice::from_ref(&provider.default_model),
        }
    }

    /// Always a member of [`Session::available_models`].
    pub fn active_model(&self) -> &str {
        let available = self.available_models();
        let selected = self
            .models
            .get(&self.provider)
            .and_then(|models| models.selected.as_deref());

        selected
            .and_then(|model| available.iter().find(|m| m.as_str() == model))
            .or_else(|| available.first())
            .map(String::as_str)
            .unwrap_or(self.provider_info().default_model.as_str())
    }

    pub fn select_persona(&mut self, persona: PersonaId) {
        if self.persona == persona {
            return;
        }
        info!(from = %self.persona, to = %persona, "switching persona");
        self.persona = persona;
        self.events.emit(SessionEvent::PersonaSelected(persona));
    }

    pub fn select_provider(&mut self, provider: ProviderId) {
        if self.provider == provider {
            return;
        }
        info!(from = %self.provider, to = %provider, "switching provider");
        if let Some(previous) = self.models.get_mut(&self.provider) {
            if !previous.fetched.is_empty() {
                debug!(provider = %self.provider, "dropping stale model list");
                previous.fetched.clear();
            }
        }
        self.provider = provider;
        self.events.emit(SessionEvent::ProviderSelected(provider));
        self.events
            .emit(SessionEvent::ModelSelected(self.active_model().to_string()));
    }

    pub fn select_model(&mut self, model: &str) -> Result<(), SessionError> {
        let model = model.trim();
        if !self.available_models().iter().any(|m| m == model) {
            return Err(SessionError::UnknownModel {
                provider: self.provider,
                model: model.to_string(),
            });
        }

        info!(provider = %self.provider, model = %model, "selecting model");
        self.models.entry(self.provider).or_default().selected = Some(model.to_string());
        self.events
            .emit(SessionEvent::ModelSelected(model.to_string()));
        Ok(())
    }

    pub fn set_streaming(&mut self, enabled: bool) {
        self.streaming = enabled;
        self.events.emit(SessionEvent::StreamingToggled(enabled));
    }

    /// Replace the in-memory credential. Blank input clears it.
    pub fn set_credential(&mut self, credential: &str) {
        self.credential = credential.trim().to_string();
        self.events.emit(SessionEvent::CredentialChanged {
            present: self.has_credential(),
        });
    }

    fn connect(&self, factory: &dyn BackendFactory) -> Result<Arc<dyn ChatBackend>, SessionError> {
        let provider = self.provider_info();
        if !self.has_credential() {
            return Err(SessionError::CredentialMissing {
                provider: provider.id,
                console_url: provider.console_url.clone(),
            });
        }
        Ok(factory.connect(provider, &self.credential)?)
    }

    /// Refresh the active provider's model list.
    ///
    /// An empty result means the list is unavailable, not that the provider
    /// has no models, so the previous list and selection are kept.
    pub async fn fetch_models(
        &mut self,
        factory: &dyn BackendFactory,
    ) -> Result<ModelRefresh, SessionError> {
        let provider = self.provider;
        if !self.provider_info().supports_model_listing() {
            return Err(SessionError::ModelListUnsupported(provider));
        }
        let backend = self.connect(factory)?;

        let models = backend.list_models().await;
        if models.is_empty() {
            warn!(provider = %provider, "model list unavailable; keeping previous selection");
            self.events.notice(
                NoticeLevel::Warning,
                format!(
                    "Could not fetch models from {provider}; still using {}.",
                    self.active_model()
                ),
            );
            return Ok(ModelRefresh::Unavailable);
        }

        let count = models.len();
        info!(provider = %provider, count, "fetched model list");
        let entry = self.models.entry(provider).or_default();
        let still_listed = entry
            .selected
            .as_ref()
            .is_some_and(|selected| models.contains(selected));
        if !still_listed {
            debug!(provider = %provider, model = %models[0], "selecting first listed model");
            entry.selected = Some(models[0].clone());
        }
        entry.fetched = models.clone();
        self.events
            .emit(SessionEvent::ModelsUpdated { provider, models });
        self.events
            .emit(SessionEvent::ModelSelected(self.active_model().to_string()));
        Ok(ModelRefresh::Updated(count))
    }

    /// Record `text` as the active persona's next user turn and prepare the
    /// completion for it. Nothing changes when an error is returned.
    pub fn begin_submit(
        &mut self,
        text: &str,
        factory: &dyn BackendFactory,
    ) -> Result<PendingCompletion, SessionError> {
        let persona = self.persona;
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if self.is_in_flight(persona) {
            return Err(SessionError::InFlight(persona));
        }
        let backend = self.connect(factory)?;

        let user_message = Message::user(text);
        let mut messages = assemble_messages(builtin_persona(persona), self.history(persona));
        messages.push(user_message.to_api());
        let request = build_request(self.active_model(), messages, self.streaming)?;

        debug!(
            persona = %persona,
            provider = %self.provider,
            model = %request.model,
            stream = request.stream,
            turns = request.messages.len(),
            "submitting message"
        );
        self.histories
            .entry(persona)
            .or_default()
            .push(user_message.clone());
        self.in_flight.insert(persona);
        self.events.emit(SessionEvent::MessageAppended {
            persona,
            message: user_message,
        });

        Ok(PendingCompletion {
            persona,
            generation: self.generation,
            request,
            backend,
            events: self.events.clone(),
        })
    }

    /// Append the assistant turn for a finished completion.
    pub fn finish_submit(&mut self, turn: CompletedTurn) -> SubmitOutcome {
        let CompletedTurn {
            persona,
            generation,
            outcome,
        } = turn;

        if generation != self.generation {
            debug!(persona = %persona, "discarding reply from before reset");
            return SubmitOutcome::Discarded;
        }
        self.in_flight.remove(&persona);

        let (message, result) = match outcome {
            Ok(text) => (Message::assistant(text.clone()), SubmitOutcome::Replied(text)),
            Err(err) => {
                warn!(persona = %persona, error = %err, "completion failed");
                (Message::assistant_error(&err), SubmitOutcome::Failed(err))
            }
        };
        self.histories
            .entry(persona)
            .or_default()
            .push(message.clone());
        self.events
            .emit(SessionEvent::MessageAppended { persona, message });
        result
    }

    pub async fn submit(
        &mut self,
        text: &str,
        factory: &dyn BackendFactory,
    ) -> Result<SubmitOutcome, SessionError> {
        let pending = self.begin_submit(text, factory)?;
        let turn = pending.run().await;
        Ok(self.finish_submit(turn))
    }

    /// Clear every persona's history. Selections and the credential stay.
    pub fn reset(&mut self) {
        info!("resetting all conversations");
        for history in self.histories.values_mut() {
            history.clear();
        }
        self.in_flight.clear();
        self.generation += 1;
        self.events.emit(SessionEvent::HistoryReset);
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            server_ip: self.server_ip.clone(),
            started_at: self.started_at,
            persona: self.persona,
            provider: self.provider,
            model: self.active_model().to_string(),
            streaming: self.streaming,
            credential_set: self.has_credential(),
        }
    }
}

/// Snapshot shown by `/info`.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub server_ip: String,
    pub started_at: DateTime<Local>,
    pub persona: PersonaId,
    pub provider: ProviderId,
    pub model: String,
    pub streaming: bool,
    pub credential_set: bool,
}

impl fmt::Display for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let persona = builtin_persona(self.persona);
        let provider = builtin_provider(self.provider);
        writeln!(f, "Server IP: {}", self.server_ip)?;
        writeln!(
            f,
            "Started:   {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(f, "Persona:   {} ({})", persona.full_name, self.persona)?;
        writeln!(f, "Provider:  {} ({})", provider.display_name, self.provider)?;
        writeln!(f, "Model:     {}", self.model)?;
        writeln!(
            f,
            "Streaming: {}",
            if self.streaming { "on" } else { "off" }
        )?;
        write!(
            f,
            "API key:   {}",
            if self.credential_set { "set" } else { "not set" }
        )
    }
}
