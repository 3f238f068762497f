//! Built-in character personas
//!
//! Each persona pairs a display name with the system prompt that is
//! synthesized at request time ahead of that persona's history. The table is
//! embedded from `builtin_personas.toml` and lives for the whole process.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaId {
    Congyu,
    Fangnai,
    Mozi,
    Leina,
}

impl PersonaId {
    pub const ALL: [PersonaId; 4] = [
        PersonaId::Congyu,
        PersonaId::Fangnai,
        PersonaId::Mozi,
        PersonaId::Leina,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PersonaId::Congyu => "congyu",
            PersonaId::Fangnai => "fangnai",
            PersonaId::Mozi => "mozi",
            PersonaId::Leina => "leina",
        }
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PersonaId {
    type Err = String;

    /// Accepts the ascii id or either of the persona's names.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        PersonaId::ALL
            .into_iter()
            .find(|id| {
                let persona = builtin_persona(*id);
                id.as_str().eq_ignore_ascii_case(value)
                    || persona.name == value
                    || persona.full_name == value
            })
            .ok_or_else(|| {
                let known: Vec<&str> = PersonaId::ALL.iter().map(|id| id.as_str()).collect();
                format!(
                    "Persona '{value}' not found. Available personas: {}",
                    known.join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    /// Short name used in prompts and transcripts.
    pub name: String,
    pub full_name: String,
    pub prompt: String,
}

#[derive(Deserialize)]
struct BuiltinPersonasConfig {
    personas: Vec<Persona>,
}

static BUILTIN_PERSONAS: LazyLock<Vec<Persona>> = LazyLock::new(|| {
    const CONFIG_CONTENT: &str = include_str!("../builtin_personas.toml");

    let config: BuiltinPersonasConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_personas.toml");
    config
        .personas
        .into_iter()
        .map(|mut persona| {
            persona.prompt = persona.prompt.trim().to_string();
            persona
        })
        .collect()
});

pub fn builtin_personas() -> &'static [Persona] {
    &BUILTIN_PERSONAS
}

pub fn builtin_persona(id: PersonaId) -> &'static Persona {
    builtin_personas()
        .iter()
        .find(|persona| persona.id == id)
        .expect("builtin_personas.toml must describe every PersonaId")
}
