//! Interactive chat over stdin/stdout.
//!
//! Input lines, session events, and finished completions are multiplexed on
//! one task. Completions run on their own tasks, so typing continues while
//! a reply streams in.

use std::error::Error;
use std::io;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use crate::commands::{process_input, CommandResult};
use crate::core::app::App;
use crate::core::backend::BackendFactory;
use crate::core::events::NoticeLevel;
use crate::core::session::CompletedTurn;
use crate::ui::render::Renderer;

pub async fn run_chat(mut app: App, factory: &dyn BackendFactory) -> Result<(), Box<dyn Error>> {
    let mut events = app.session.subscribe();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<CompletedTurn>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut renderer = Renderer::new(io::stdout());
    renderer.banner(&app)?;

    let mut input_open = true;
    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                renderer.handle(&event, &app)?;
            }
            Some(turn) = done_rx.recv() => {
                let persona = turn.persona();
                let outcome = app.session.finish_submit(turn);
                debug!(persona = %persona, ?outcome, "completion finished");
            }
            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    input_open = false;
                    continue;
                };
                match process_input(&mut app, &line) {
                    CommandResult::Continue => {}
                    CommandResult::Submit(text) => {
                        match app.session.begin_submit(&text, factory) {
                            Ok(pending) => {
                                let done_tx = done_tx.clone();
                                tokio::spawn(async move {
                                    let _ = done_tx.send(pending.run().await);
                                });
                            }
                            Err(err) => app.session.notify(NoticeLevel::Error, err.to_string()),
                        }
                    }
                    CommandResult::FetchModels => {
                        if let Err(err) = app.session.fetch_models(factory).await {
                            app.session.notify(NoticeLevel::Error, err.to_string());
                        }
                    }
                    CommandResult::Quit => break,
                }
            }
        }

        // Once input is exhausted, wait only for replies already requested.
        if !input_open && !app.session.has_pending() {
            break;
        }
    }

    while let Ok(event) = events.try_recv() {
        renderer.handle(&event, &app)?;
    }
    Ok(())
}
