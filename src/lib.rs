//! Senren is a terminal chat front-end for talking with a small cast of
//! Senren*Banka character personas through OpenAI-compatible chat APIs.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the provider registry, persona store, per-persona
//!   conversation state, request assembly and streaming orchestration.
//! - [`api`] defines the chat/model payloads exchanged with providers.
//! - [`commands`] implements slash-command parsing and execution.
//! - [`ui`] runs the line-oriented chat loop and renders session events.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
