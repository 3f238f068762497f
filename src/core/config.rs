//! Optional user configuration.
//!
//! The file is only ever read. A missing file is the same as an empty one.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::builtin_providers::ProviderId;
use crate::core::persona::PersonaId;

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
pub struct Config {
    pub default_provider: Option<ProviderId>,
    pub default_persona: Option<PersonaId>,
    /// Stream replies as they arrive; on unless set to false.
    pub streaming: Option<bool>,
    /// Preferred model per provider id, used until the user picks another.
    #[serde(default)]
    pub default_models: HashMap<String, String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(
                    f,
                    "Failed to read config at {}: {}",
                    path_display(path),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    path_display(path),
                    source
                )
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Abbreviate paths under the home directory with `~`.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "senren", "senren").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from the platform config directory.
    pub fn load() -> Result<Config, ConfigError> {
        match Self::config_path() {
            Some(path) => Self::load_from_path(&path),
            None => {
                debug!("no config directory on this platform");
                Ok(Config::default())
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    /// `[default_models]` keyed by provider. Unknown provider keys are
    /// skipped with a warning.
    pub fn preferred_models(&self) -> HashMap<ProviderId, String> {
        let mut preferred = HashMap::new();
        for (key, model) in &self.default_models {
            match key.parse::<ProviderId>() {
                Ok(provider) => {
                    preferred.insert(provider, model.trim().to_string());
                }
                Err(err) => warn!(key = %key, "ignoring default model: {err}"),
            }
        }
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from_path(&dir.path().join("config.toml")).expect("load");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn reads_every_key() {
        let file = write_config(
            r#"
default_provider = "deepseek"
default_persona = "mozi"
streaming = false

[default_models]
siliconflow = "Qwen/Qwen2.5-72B-Instruct"
deepseek = "deepseek-reasoner"
"#,
        );

        let config = Config::load_from_path(file.path()).expect("load");
        assert_eq!(config.default_provider, Some(ProviderId::DeepSeek));
        assert_eq!(config.default_persona, Some(PersonaId::Mozi));
        assert_eq!(config.streaming, Some(false));

        let preferred = config.preferred_models();
        assert_eq!(preferred.len(), 2);
        assert_eq!(
            preferred.get(&ProviderId::DeepSeek).map(String::as_str),
            Some("deepseek-reasoner")
        );
    }

    #[test]
    fn unknown_provider_keys_are_dropped() {
        let file = write_config("[default_models]\nanthropic = \"claude\"\nopenai = \"gpt-4o\"\n");
        let preferred = Config::load_from_path(file.path())
            .expect("load")
            .preferred_models();
        assert_eq!(preferred.len(), 1);
        assert_eq!(
            preferred.get(&ProviderId::OpenAi).map(String::as_str),
            Some("gpt-4o")
        );
    }

    #[test]
    fn invalid_toml_reports_the_path() {
        let file = write_config("default_provider = [");
        let err = Config::load_from_path(file.path()).expect_err("parse should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("Failed to parse config at "));
        assert!(err.source().is_some());
    }
}
