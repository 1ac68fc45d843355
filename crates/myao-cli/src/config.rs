//! Configuration file support

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use myao_agent::EvictionPolicy;
use serde::{Deserialize, Serialize};

/// Configuration for myao
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model to use
    pub model: Option<String>,
    /// OpenAI-compatible endpoint
    pub base_url: Option<String>,
    /// Built-in character (default, english-teacher, nyao)
    pub character: Option<String>,
    /// Custom persona file, overrides `character`
    pub persona_file: Option<String>,
    /// Directory for the summary file
    pub persistent_dir: Option<String>,
    /// Upper bound of the random reply delay, in seconds
    pub max_delay_reply_secs: Option<u64>,
    /// Reply delay when the bot is mentioned, in milliseconds
    pub mention_delay_ms: Option<u64>,
    /// The bot's own user id, used for `<@id>` mentions
    pub bot_user_id: Option<String>,
    /// Display name of the person typing on the console
    pub console_user: Option<String>,
    /// OpenAI organization id
    pub organization: Option<String>,
    /// Workspace members: user id -> display name
    pub users: BTreeMap<String, String>,
    /// API keys (alternative to environment variables)
    pub api_keys: ApiKeys,
    /// Memory budget policy
    pub memory: EvictionPolicy,
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub openai: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("myao")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for MYAO_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("MYAO_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a file; missing or broken files fall back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse config file");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config file");
                Self::default()
            }
        }
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some("gpt-4o".to_string()),
            character: Some("default".to_string()),
            persistent_dir: Some("./".to_string()),
            max_delay_reply_secs: Some(600),
            ..Default::default()
        };

        default_config.save_to(&path)?;
        Ok(path)
    }

    /// OpenAI API key, checking config then `OPENAI_API_KEY`
    pub fn get_api_key(&self) -> Option<String> {
        self.api_keys
            .openai
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()))
    }

    /// Organization id, checking config then `OPENAI_ORG_ID`
    pub fn get_organization(&self) -> Option<String> {
        self.organization
            .clone()
            .filter(|o| !o.is_empty())
            .or_else(|| std::env::var("OPENAI_ORG_ID").ok().filter(|o| !o.is_empty()))
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# myao configuration file
# Place at ~/.config/myao/config.toml (Linux/Mac) or %APPDATA%\myao\config.toml (Windows)

# Model to use
model = "gpt-4o"

# OpenAI-compatible endpoint (optional)
# base_url = "https://api.openai.com/v1"

# Built-in character (default, english-teacher, nyao)
character = "default"

# Custom persona file (optional, overrides character)
# persona_file = "~/.config/myao/persona.toml"

# Where the conversation summary is kept
persistent_dir = "./"

# Unaddressed messages get a random reply delay below this many seconds
max_delay_reply_secs = 600

# Reply delay when the bot is mentioned, in milliseconds
# mention_delay_ms = 0

# The bot's own user id; "<@MYAO>" in a message mentions the bot
# bot_user_id = "MYAO"

# Your display name on the console
# console_user = "alice"

# OpenAI organization id (optional, or set OPENAI_ORG_ID)
# organization = "org-..."

# Workspace members listed in the system prompt (user id = display name)
[users]
# U012345 = "bob"

# API keys (optional - can also use environment variables)
[api_keys]
# openai = "sk-..."

# Memory budget
[memory]
# budget_tokens = 16192
# overflow_evict = 8
# min_evict = 3
# init_threshold = 15
# on_budget_exceeded = "evict"    # or "summarize"
"#
}
