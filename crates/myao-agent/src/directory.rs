//! Workspace members and `<@USERID>` mention resolution.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@([A-Za-z0-9_]+)>").unwrap());

/// Maps user ids to display names
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    names: HashMap<String, String>,
}

impl UserDirectory {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(id.into(), name.into());
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Display names, sorted for a stable system prompt
    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.values().cloned().collect();
        names.sort();
        names
    }

    /// Replace known mentions with display names, and the bot's own mention
    /// with `bot_name`. Unknown mentions are left as they are.
    pub fn resolve_mentions(&self, text: &str, bot: &BotIdentity, bot_name: &str) -> String {
        MENTION
            .replace_all(text, |caps: &Captures| {
                let id = &caps[1];
                if id == bot.user_id {
                    bot_name.to_string()
                } else {
                    match self.names.get(id) {
                        Some(name) => name.clone(),
                        None => caps[0].to_string(),
                    }
                }
            })
            .into_owned()
    }
}

/// The bot's own account on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
}

impl BotIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// The raw token that mentions the bot
    pub fn mention(&self) -> String {
        format!("<@{}>", self.user_id)
    }
}
