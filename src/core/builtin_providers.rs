//! Built-in provider registry
//!
//! The three supported chat providers are described in `builtin_providers.toml`,
//! embedded at build time and parsed once on first access.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAi,
    SiliconFlow,
    DeepSeek,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [
        ProviderId::OpenAi,
        ProviderId::SiliconFlow,
        ProviderId::DeepSeek,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::SiliconFlow => "siliconflow",
            ProviderId::DeepSeek => "deepseek",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ProviderId::ALL
            .into_iter()
            .find(|id| {
                id.as_str().eq_ignore_ascii_case(value)
                    || builtin_provider(*id).display_name.eq_ignore_ascii_case(value)
            })
            .ok_or_else(|| {
                let known: Vec<&str> = ProviderId::ALL.iter().map(|id| id.as_str()).collect();
                format!(
                    "Unknown provider '{value}'. Available providers: {}",
                    known.join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuiltinProvider {
    pub id: ProviderId,
    pub display_name: String,
    pub base_url: String,
    /// Model catalog endpoint; providers without one use `fixed_models`.
    pub models_url: Option<String>,
    pub default_model: String,
    #[serde(default)]
    pub fixed_models: Vec<String>,
    pub console_url: String,
}

impl BuiltinProvider {
    pub fn supports_model_listing(&self) -> bool {
        self.models_url.is_some()
    }
}

#[derive(Deserialize)]
struct BuiltinProvidersConfig {
    providers: Vec<BuiltinProvider>,
}

static BUILTIN_PROVIDERS: LazyLock<Vec<BuiltinProvider>> = LazyLock::new(|| {
    const CONFIG_CONTENT: &str = include_str!("../builtin_providers.toml");

    let config: BuiltinProvidersConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_providers.toml");
    config.providers
});

pub fn builtin_providers() -> &'static [BuiltinProvider] {
    &BUILTIN_PROVIDERS
}

/// Resolve a provider id to its registry entry. Total over [`ProviderId`].
pub fn builtin_provider(id: ProviderId) -> &'static BuiltinProvider {
    builtin_providers()
        .iter()
        .find(|provider| provider.id == id)
        .expect("builtin_providers.toml must describe every ProviderId")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_provider_id_resolves() {
        for id in ProviderId::ALL {
            let provider = builtin_provider(id);
            assert_eq!(provider.id, id);
            assert!(provider.base_url.starts_with("https://"));
            assert!(!provider.default_model.is_empty());
        }
        assert_eq!(builtin_providers().len(), ProviderId::ALL.len());
    }

    #[test]
    fn registry_matches_known_endpoints() {
        let openai = builtin_provider(ProviderId::OpenAi);
        assert_eq!(openai.base_url, "https://api.openai.com/v1");
        assert!(!openai.supports_model_listing());
        assert_eq!(openai.fixed_models, vec!["gpt-3.5-turbo", "gpt-4", "gpt-4o"]);
        assert_eq!(openai.default_model, "gpt-3.5-turbo");

        let siliconflow = builtin_provider(ProviderId::SiliconFlow);
        assert_eq!(siliconflow.base_url, "https://api.siliconflow.cn/v1");
        assert_eq!(
            siliconflow.models_url.as_deref(),
            Some("https://api.siliconflow.cn/v1/models")
        );
        assert_eq!(siliconflow.default_model, "deepseek-ai/DeepSeek-V3");

        let deepseek = builtin_provider(ProviderId::DeepSeek);
        assert_eq!(deepseek.base_url, "https://api.deepseek.com/v1");
        assert_eq!(
            deepseek.models_url.as_deref(),
            Some("https://api.deepseek.com/models")
        );
        assert_eq!(deepseek.default_model, "deepseek-chat");
    }

    #[test]
    fn provider_ids_parse_case_insensitively() {
        assert_eq!("DeepSeek".parse::<ProviderId>(), Ok(ProviderId::DeepSeek));
        assert_eq!("openai".parse::<ProviderId>(), Ok(ProviderId::OpenAi));
        assert_eq!("SILICONFLOW".parse::<ProviderId>(), Ok(ProviderId::SiliconFlow));

        let err = "anthropic".parse::<ProviderId>().unwrap_err();
        assert!(err.contains("openai, siliconflow, deepseek"));
    }
}
