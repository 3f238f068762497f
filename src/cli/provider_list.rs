use crate::core::builtin_providers::{builtin_providers, ProviderId};

/// Render the provider table, marking `selected` with `*`.
pub fn provider_table(selected: Option<ProviderId>) -> String {
    let mut table = String::from("Built-in providers:\n\n");
    table.push_str(&format!(
        "  {:<13} {:<12} {:<31} {}\n",
        "ID", "NAME", "BASE URL", "MODEL LIST"
    ));

    for provider in builtin_providers() {
        let id = if selected == Some(provider.id) {
            format!("{}*", provider.id)
        } else {
            provider.id.to_string()
        };
        let listing = if provider.supports_model_listing() {
            "fetched"
        } else {
            "built-in"
        };
        table.push_str(&format!(
            "  {:<13} {:<12} {:<31} {}\n",
            id, provider.display_name, provider.base_url, listing
        ));
    }

    if selected.is_some() {
        table.push_str("\n* = selected provider\n");
    }
    table
}

pub fn list_providers(selected: Option<ProviderId>) {
    print!("{}", provider_table(selected));
}
