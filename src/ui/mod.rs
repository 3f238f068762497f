//! Terminal layer for interactive chat sessions.
//!
//! - [`chat_loop`]: reads stdin, dispatches to [`crate::commands`], and runs
//!   completions on background tasks.
//! - [`render`]: turns [`crate::core::events::SessionEvent`]s into terminal
//!   lines.
//!
//! This layer only presents state; [`crate::core`] owns the session.

pub mod chat_loop;
pub mod render;
