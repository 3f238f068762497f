pub mod app;
pub mod backend;
pub mod builtin_providers;
pub mod chat_client;
pub mod chat_stream;
pub mod completion;
pub mod config;
pub mod error;
pub mod events;
pub mod message;
pub mod persona;
pub mod session;
