//! Command-line interface parsing and handling
//!
//! This module parses arguments, folds them together with the config file and
//! environment into a [`Session`], and runs the requested subcommand.

pub mod model_list;
pub mod persona_list;
pub mod provider_list;
pub mod say;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::model_list::list_models;
use crate::cli::persona_list::list_personas;
use crate::cli::provider_list::list_providers;
use crate::cli::say::say;
use crate::core::app::App;
use crate::core::backend::{BackendFactory, HttpBackendFactory};
use crate::core::builtin_providers::ProviderId;
use crate::core::config::{path_display, Config};
use crate::core::persona::PersonaId;
use crate::core::session::{Session, SessionInit};
use crate::ui::chat_loop::run_chat;
use crate::utils::logging::TranscriptLog;

pub const API_KEY_ENV: &str = "SENREN_API_KEY";
pub const SERVER_IP_ENV: &str = "SERVER_IP";
pub const LOG_ENV: &str = "SENREN_LOG";

#[derive(Parser, Debug)]
#[command(name = "senren", version)]
#[command(about = "Chat with the Senren*Banka cast over OpenAI-compatible APIs")]
#[command(
    long_about = "Senren is a terminal chat front-end. Pick one of four personas, each with \
its own system prompt and conversation history, and talk to it through OpenAI, SiliconFlow, \
or DeepSeek.\n\n\
Environment Variables:\n\
  SENREN_API_KEY    API key for the selected provider (kept in memory only)\n\
  SERVER_IP         Address shown by /info (optional)\n\
  SENREN_LOG        Diagnostic log filter, e.g. 'senren=debug' (default: warn)\n\n\
Commands inside the chat:\n\
  /help             List every command\n\
  /persona <id>     Switch persona (congyu, fangnai, mozi, leina)\n\
  /key <api-key>    Set the API key for this run\n\
  /reset            Clear every persona's history"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Provider to use (openai, siliconflow, deepseek)
    #[arg(short = 'p', long, global = true, value_name = "PROVIDER")]
    pub provider: Option<ProviderId>,

    /// Persona to start with (congyu, fangnai, mozi, leina)
    #[arg(short = 'c', long, global = true, value_name = "PERSONA")]
    pub persona: Option<PersonaId>,

    /// Model to select for the provider
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Wait for whole replies instead of streaming them
    #[arg(long, global = true)]
    pub no_stream: bool,

    /// Write a transcript of the conversation to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// Send one message to the persona and print the reply
    Say {
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Fetch and list the provider's models
    Models,
    /// List the built-in providers
    Providers,
    /// List the personas
    Personas,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}

async fn async_main(mut args: Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let factory = HttpBackendFactory;

    match args.command.take().unwrap_or(Commands::Chat) {
        Commands::Providers => {
            list_providers(args.provider.or(config.default_provider));
            Ok(())
        }
        Commands::Personas => {
            list_personas(args.persona.or(config.default_persona));
            Ok(())
        }
        Commands::Models => {
            let mut session = Session::new(session_init(&args, &config, env_var));
            list_models(&mut session, &factory).await
        }
        Commands::Say { prompt } => {
            let session = prepare_session(&args, &config, &factory).await?;
            say(session, &prompt.join(" "), &factory).await
        }
        Commands::Chat => {
            let session = prepare_session(&args, &config, &factory).await?;
            let transcript = TranscriptLog::new(args.log.clone()).map_err(|err| {
                let path = args.log.as_deref().map(path_display).unwrap_or_default();
                format!("Cannot open log file {path}: {err}")
            })?;
            run_chat(App::new(session, transcript), &factory).await
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Fold flags, config, and environment into starting selections. Flags win
/// over the config file.
pub fn session_init(
    args: &Args,
    config: &Config,
    env: impl Fn(&str) -> Option<String>,
) -> SessionInit {
    let defaults = SessionInit::default();
    let provider = args
        .provider
        .or(config.default_provider)
        .unwrap_or(defaults.provider);

    let mut preferred_models = config.preferred_models();
    if let Some(model) = args.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        preferred_models.insert(provider, model.to_string());
    }

    SessionInit {
        persona: args
            .persona
            .or(config.default_persona)
            .unwrap_or(defaults.persona),
        provider,
        streaming: !args.no_stream && config.streaming.unwrap_or(defaults.streaming),
        credential: env(API_KEY_ENV).unwrap_or_default(),
        preferred_models,
        server_ip: env(SERVER_IP_ENV)
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty())
            .unwrap_or(defaults.server_ip),
    }
}

/// Build the session and, when `--model` names a model, fetch the model
/// list so the choice can be honoured immediately.
async fn prepare_session(
    args: &Args,
    config: &Config,
    factory: &dyn BackendFactory,
) -> Result<Session, Box<dyn Error>> {
    let mut session = Session::new(session_init(args, config, env_var));

    let Some(model) = args.model.as_deref() else {
        return Ok(session);
    };
    if session.provider_info().supports_model_listing() && session.has_credential() {
        debug!(provider = %session.provider(), "fetching models for --model");
        session.fetch_models(factory).await?;
    }
    if let Err(err) = session.select_model(model) {
        warn!(model = %model, "requested model not selectable yet");
        eprintln!(
            "⚠️  {err} Using {} until the model list includes it.",
            session.active_model()
        );
    }
    Ok(session)
}
