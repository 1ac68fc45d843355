//! Built-in characters and persona files

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use myao_agent::{
    Character, DualAgent, EvictionPolicy, MemoryStore, PersonaConfig, SingleAgent, SummaryStore,
};
use myao_ai::CompletionClient;

const DEFAULT: &str = include_str!("../personas/default.toml");
const ENGLISH_TEACHER: &str = include_str!("../personas/english_teacher.toml");
const NYAO: &str = include_str!("../personas/nyao.toml");
const ENGLISH_TEACHING_SYSTEM: &str = include_str!("../personas/english_teaching_system.toml");

/// Names accepted by `--character`
pub const BUILTIN_NAMES: &[&str] = &["default", "english-teacher", "nyao"];

/// Persona definitions for one character
#[derive(Debug, Clone)]
pub enum CharacterSpec {
    Single(PersonaConfig),
    Dual {
        primary: PersonaConfig,
        corrector: PersonaConfig,
    },
}

impl CharacterSpec {
    pub fn name(&self) -> &str {
        match self {
            CharacterSpec::Single(p) => &p.name,
            CharacterSpec::Dual { primary, .. } => &primary.name,
        }
    }
}

/// Parse and validate a persona TOML document
pub fn parse_persona(text: &str) -> anyhow::Result<PersonaConfig> {
    let persona: PersonaConfig = toml::from_str(text).context("invalid persona file")?;
    persona.validate()?;
    Ok(persona)
}

pub fn load_persona_file(path: &Path) -> anyhow::Result<PersonaConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read persona file {}", path.display()))?;
    parse_persona(&text).with_context(|| format!("in {}", path.display()))
}

/// Look up a built-in character. Unknown names fall back to `default`.
pub fn builtin(name: &str) -> anyhow::Result<CharacterSpec> {
    Ok(match name {
        "nyao" => CharacterSpec::Dual {
            primary: parse_persona(NYAO)?,
            corrector: parse_persona(ENGLISH_TEACHING_SYSTEM)?,
        },
        "english-teacher" => CharacterSpec::Single(parse_persona(ENGLISH_TEACHER)?),
        "default" => CharacterSpec::Single(parse_persona(DEFAULT)?),
        other => {
            tracing::warn!(character = other, "unknown character, using default");
            CharacterSpec::Single(parse_persona(DEFAULT)?)
        }
    })
}

/// Runtime wiring shared by every persona of a character
pub struct BuildOptions<'a> {
    pub model: &'a str,
    pub client: Arc<dyn CompletionClient>,
    pub persistent_dir: &'a Path,
    /// Names the summary file
    pub character: &'a str,
    pub members: Vec<String>,
    pub policy: EvictionPolicy,
}

/// Build the persona; only the primary persona keeps a summary file
pub fn build(spec: CharacterSpec, opts: BuildOptions<'_>) -> Character {
    let memory = |persona: PersonaConfig| {
        MemoryStore::new(persona, opts.model, Arc::clone(&opts.client))
            .with_members(&opts.members)
            .with_policy(opts.policy.clone())
    };
    let summary = Arc::new(SummaryStore::for_character(
        opts.persistent_dir,
        opts.character,
    ));

    match spec {
        CharacterSpec::Single(persona) => {
            Character::Single(SingleAgent::new(memory(persona).with_summary_store(summary)))
        }
        CharacterSpec::Dual { primary, corrector } => Character::Dual(DualAgent::new(
            SingleAgent::new(memory(primary).with_summary_store(summary)),
            SingleAgent::new(memory(corrector)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use myao_agent::Persona;
    use myao_ai::{CompletionRequest, CompletionResponse};

    struct Offline;

    #[async_trait]
    impl CompletionClient for Offline {
        async fn complete(&self, _request: &CompletionRequest) -> myao_ai::Result<CompletionResponse> {
            Err(myao_ai::Error::UnexpectedResponse("offline".to_string()))
        }
    }

    fn options<'a>(dir: &'a Path, character: &'a str) -> BuildOptions<'a> {
        BuildOptions {
            model: "gpt-4o",
            client: Arc::new(Offline),
            persistent_dir: dir,
            character,
            members: vec!["alice".to_string()],
            policy: EvictionPolicy::default(),
        }
    }

    #[test]
    fn test_builtins_parse() {
        for name in BUILTIN_NAMES {
            builtin(name).unwrap();
        }
        assert!(matches!(builtin("nyao").unwrap(), CharacterSpec::Dual { .. }));
        assert_eq!(builtin("english-teacher").unwrap().name(), "myao");
    }

    #[test]
    fn test_unknown_falls_back_to_default() {
        let spec = builtin("pirate").unwrap();
        assert_eq!(spec.name(), "myao");
    }

    #[test]
    fn test_parse_persona_rejects_invalid() {
        assert!(parse_persona("name = \"\"").is_err());
        assert!(parse_persona("name = 3").is_err());
    }

    #[test]
    fn test_load_persona_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        std::fs::write(&path, "name = \"bot\"\nsystem_text = \"hi {members}\"").unwrap();
        let persona = load_persona_file(&path).unwrap();
        assert_eq!(persona.name, "bot");
        assert!(load_persona_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_build_single_loads_summary() {
        let dir = tempfile::tempdir().unwrap();
        SummaryStore::for_character(dir.path(), "default")
            .save("we met before")
            .unwrap();

        let character = build(builtin("default").unwrap(), options(dir.path(), "default"));
        let Character::Single(agent) = character else {
            panic!("expected a single persona");
        };
        assert_eq!(agent.name(), "myao");
        let turns = agent.memory().turns();
        assert!(turns.last().unwrap().is_summary());

        let system = agent.memory().snapshot()[0].text();
        assert!(system.contains("- alice\n"));
    }

    #[test]
    fn test_build_dual() {
        let dir = tempfile::tempdir().unwrap();
        let character = build(builtin("nyao").unwrap(), options(dir.path(), "nyao"));
        assert_eq!(character.name(), "nyao");
        let Character::Dual(agent) = character else {
            panic!("expected a dual persona");
        };
        assert_eq!(agent.corrector().memory().len(), 4);
    }
}
