mod registry;

pub use registry::{all_commands, CommandInvocation};

use std::path::PathBuf;

use crate::core::app::App;
use crate::core::builtin_providers::{builtin_providers, ProviderId};
use crate::core::events::NoticeLevel;
use crate::core::persona::{builtin_personas, PersonaId};

#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    Submit(String),
    /// Refresh the active provider's model list.
    FetchModels,
    Quit,
}

pub fn process_input(app: &mut App, input: &str) -> CommandResult {
    let trimmed = input.trim();

    if !trimmed.starts_with('/') {
        return CommandResult::Submit(input.to_string());
    }

    let mut parts = trimmed[1..].splitn(2, ' ');
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::Submit(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    if let Some(command) = registry::find_command(command_name) {
        (command.handler)(app, CommandInvocation { args })
    } else {
        CommandResult::Submit(input.to_string())
    }
}

fn info(app: &App, text: impl Into<String>) -> CommandResult {
    app.session.notify(NoticeLevel::Info, text);
    CommandResult::Continue
}

fn error(app: &App, text: impl Into<String>) -> CommandResult {
    app.session.notify(NoticeLevel::Error, text);
    CommandResult::Continue
}

fn marker(active: bool) -> &'static str {
    if active {
        "*"
    } else {
        " "
    }
}

pub(super) fn handle_help(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let mut help = String::from("Commands:");
    for command in all_commands() {
        help.push_str(&format!("\n  {:<18} {}", command.usage, command.help));
    }
    help.push_str("\nAnything else is sent to the current persona.");
    info(app, help)
}

pub(super) fn handle_persona(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        let current = app.session.persona();
        let lines: Vec<String> = builtin_personas()
            .iter()
            .map(|persona| {
                format!(
                    "{} {:<8} {}",
                    marker(persona.id == current),
                    persona.id,
                    persona.full_name
                )
            })
            .collect();
        return info(app, format!("Personas:\n{}", lines.join("\n")));
    }

    match invocation.args.parse::<PersonaId>() {
        Ok(persona) => {
            app.session.select_persona(persona);
            CommandResult::Continue
        }
        Err(err) => error(app, err),
    }
}

pub(super) fn handle_provider(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        let current = app.session.provider();
        let lines: Vec<String> = builtin_providers()
            .iter()
            .map(|provider| {
                format!(
                    "{} {:<12} {}",
                    marker(provider.id == current),
                    provider.id,
                    provider.base_url
                )
            })
            .collect();
        return info(app, format!("Providers:\n{}", lines.join("\n")));
    }

    match invocation.args.parse::<ProviderId>() {
        Ok(provider) => {
            app.session.select_provider(provider);
            CommandResult::Continue
        }
        Err(err) => error(app, err),
    }
}

pub(super) fn handle_key(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    app.session.set_credential(invocation.args);
    if app.session.has_credential() {
        info(app, "API key set for this session.")
    } else {
        info(app, "API key cleared.")
    }
}

pub(super) fn handle_models(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::FetchModels
}

pub(super) fn handle_model(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        let active = app.session.active_model();
        let lines: Vec<String> = app
            .session
            .available_models()
            .iter()
            .map(|model| format!("{} {model}", marker(model == active)))
            .collect();
        return info(
            app,
            format!("Models for {}:\n{}", app.session.provider(), lines.join("\n")),
        );
    }

    match app.session.select_model(invocation.args) {
        Ok(()) => CommandResult::Continue,
        Err(err) => error(app, err.to_string()),
    }
}

pub(super) fn handle_stream(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let enabled = match invocation.args.to_ascii_lowercase().as_str() {
        "" => !app.session.streaming(),
        "on" => true,
        "off" => false,
        _ => return error(app, "Usage: /stream [on|off]"),
    };
    app.session.set_streaming(enabled);
    CommandResult::Continue
}

pub(super) fn handle_reset(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    app.session.reset();
    CommandResult::Continue
}

pub(super) fn handle_info(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let text = format!(
        "{}\nLog:       {}",
        app.session.info(),
        app.transcript.status()
    );
    info(app, text)
}

pub(super) fn handle_log(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        return match app.transcript.toggle() {
            Ok(message) => info(app, message),
            Err(message) => error(app, message),
        };
    }

    match app.transcript.set_log_file(PathBuf::from(invocation.args)) {
        Ok(message) => info(app, message),
        Err(err) => error(app, format!("Logfile error: {err}")),
    }
}

pub(super) fn handle_quit(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}
