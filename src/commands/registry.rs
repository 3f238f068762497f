use super::CommandResult;
use crate::core::app::App;

pub type CommandHandler = fn(&mut App, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "persona",
        usage: "/persona [id]",
        help: "List personas or switch to one; each keeps its own history.",
        handler: super::handle_persona,
    },
    Command {
        name: "provider",
        usage: "/provider [id]",
        help: "List providers or switch to one.",
        handler: super::handle_provider,
    },
    Command {
        name: "key",
        usage: "/key [api-key]",
        help: "Set the API key for this run. Without a value the key is cleared.",
        handler: super::handle_key,
    },
    Command {
        name: "models",
        usage: "/models",
        help: "Fetch the current provider's model list.",
        handler: super::handle_models,
    },
    Command {
        name: "model",
        usage: "/model [name]",
        help: "Show the available models or select one.",
        handler: super::handle_model,
    },
    Command {
        name: "stream",
        usage: "/stream [on|off]",
        help: "Toggle streaming replies.",
        handler: super::handle_stream,
    },
    Command {
        name: "reset",
        usage: "/reset",
        help: "Clear the conversation history of every persona.",
        handler: super::handle_reset,
    },
    Command {
        name: "info",
        usage: "/info",
        help: "Show server and session details.",
        handler: super::handle_info,
    },
    Command {
        name: "log",
        usage: "/log [file]",
        help: "Start a transcript in a file, or pause/resume it.",
        handler: super::handle_log,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Leave the chat.",
        handler: super::handle_quit,
    },
];
