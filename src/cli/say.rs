//! One-shot `say` subcommand.

use std::error::Error;
use std::io::{self, Write};

use crate::core::backend::BackendFactory;
use crate::core::events::SessionEvent;
use crate::core::session::{Session, SubmitOutcome};

pub async fn say(
    session: Session,
    prompt: &str,
    factory: &dyn BackendFactory,
) -> Result<(), Box<dyn Error>> {
    say_to(session, prompt, factory, io::stdout()).await?;
    Ok(())
}

/// Submit `prompt` to the session's persona and write the reply to `out`,
/// streaming it as it arrives when streaming is on.
pub async fn say_to<W>(
    mut session: Session,
    prompt: &str,
    factory: &dyn BackendFactory,
    mut out: W,
) -> Result<W, Box<dyn Error>>
where
    W: Write + Send + 'static,
{
    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        while let Some(event) = events.recv().await {
            if let SessionEvent::ResponseProgress { partial, .. } = event {
                if let Some(rest) = partial.get(printed..) {
                    write!(out, "{rest}")?;
                    out.flush()?;
                }
                printed = partial.len();
            }
        }
        Ok::<_, io::Error>((out, printed))
    });

    let outcome = session.submit(prompt, factory).await;
    // Closing the session ends the event stream and lets the printer finish.
    drop(session);
    let (mut out, printed) = printer.await??;

    match outcome? {
        SubmitOutcome::Replied(text) if printed == 0 => writeln!(out, "{text}")?,
        SubmitOutcome::Replied(_) | SubmitOutcome::Discarded => writeln!(out)?,
        SubmitOutcome::Failed(err) => {
            if printed > 0 {
                writeln!(out)?;
            }
            return Err(err.into());
        }
    }
    Ok(out)
}
