//! Model listing functionality
//!
//! Fetches the selected provider's model list with the same session logic the
//! chat uses, and prints it.

use std::error::Error;

use crate::core::backend::BackendFactory;
use crate::core::error::SessionError;
use crate::core::session::{ModelRefresh, Session};

/// Fetch the model list and render it. Providers without a list endpoint
/// show their built-in choices.
pub async fn describe_models(
    session: &mut Session,
    factory: &dyn BackendFactory,
) -> Result<String, Box<dyn Error>> {
    let provider = session.provider_info();
    let mut output = format!("Available models for {}\n\n", provider.display_name);

    match session.fetch_models(factory).await {
        Ok(ModelRefresh::Updated(count)) => {
            output.push_str(&format!("Found {count} models:\n"));
        }
        Ok(ModelRefresh::Unavailable) => {
            return Err(format!(
                "Could not fetch models from {}. Check the API key and network connection.",
                provider.display_name
            )
            .into());
        }
        Err(SessionError::ModelListUnsupported(_)) => {
            output.push_str(&format!(
                "{} does not publish a model list. Built-in choices:\n",
                provider.display_name
            ));
        }
        Err(err) => return Err(err.into()),
    }

    let active = session.active_model();
    for model in session.available_models() {
        let marker = if model == active { "*" } else { " " };
        output.push_str(&format!("{marker} {model}\n"));
    }
    output.push_str("\n* = model a new chat would use\n");
    Ok(output)
}

pub async fn list_models(
    session: &mut Session,
    factory: &dyn BackendFactory,
) -> Result<(), Box<dyn Error>> {
    print!("{}", describe_models(session, factory).await?);
    Ok(())
}
