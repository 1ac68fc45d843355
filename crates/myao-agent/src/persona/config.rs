//! Persona definition: prompts, canned texts and seed conversation.

use myao_ai::Role;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A fixed turn appended to memory when the persona starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedTurn {
    pub role: Role,
    pub content: String,
}

/// Everything that defines how a persona talks.
///
/// Templates use `{name}` placeholders:
/// * `system_text`: `{members}` becomes a bullet list of member names
/// * `text_format`: `{user}` and `{text}`
/// * `summary_context`: `{summary}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub name: String,
    pub system_text: String,
    /// Appended to the system turn while the history is still short
    pub init_text: String,
    /// Sent instead of a reply when the backend fails
    pub error_text: String,
    /// Instruction that asks the model to summarize the conversation
    pub summary_text: String,
    /// Appended to the system turn once the summary turn has been evicted
    pub summary_context: String,
    pub temperature: Option<f32>,
    pub text_format: String,
    pub init_conversations: Vec<SeedTurn>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "myao".to_string(),
            system_text: String::new(),
            init_text: String::new(),
            error_text: "Sorry, something went wrong. Please try again later.".to_string(),
            summary_text: "Summarize the conversation so far, keeping names and open topics."
                .to_string(),
            summary_context: "\n\nSummary of the earlier conversation:\n{summary}".to_string(),
            temperature: None,
            text_format: "{user}: {text}".to_string(),
            init_conversations: Vec::new(),
        }
    }
}

impl PersonaConfig {
    /// Reject configurations that cannot drive a conversation
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("persona name is empty".to_string()));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::Config(format!(
                    "temperature {} is outside 0.0..=2.0",
                    t
                )));
            }
        }
        if self
            .init_conversations
            .iter()
            .any(|seed| seed.role == Role::System)
        {
            return Err(Error::Config(
                "seed conversations cannot contain system turns".to_string(),
            ));
        }
        Ok(())
    }

    /// System prompt with the member list filled in
    pub fn system_prompt(&self, members: &[String]) -> String {
        let list: String = members.iter().map(|m| format!("- {}\n", m)).collect();
        render(&self.system_text, &[("members", &list)])
    }

    /// Attribute a message to its author
    pub fn format_text(&self, user: &str, text: &str) -> String {
        render(&self.text_format, &[("user", user), ("text", text)])
    }

    /// System-turn suffix carrying the running summary
    pub fn summary_context(&self, summary: &str) -> String {
        render(&self.summary_context, &[("summary", summary)])
    }
}

/// Substitute `{key}` placeholders in a single pass over the template,
/// so substituted values are never themselves expanded.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    'outer: while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        for (key, value) in vars {
            if let Some(after) = tail.strip_prefix(key).and_then(|t| t.strip_prefix('}')) {
                out.push_str(value);
                rest = after;
                continue 'outer;
            }
        }
        out.push('{');
        rest = tail;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_text() {
        let config = PersonaConfig::default();
        assert_eq!(config.format_text("alice", "hello"), "alice: hello");
    }

    #[test]
    fn test_format_text_does_not_expand_values() {
        let config = PersonaConfig::default();
        assert_eq!(config.format_text("{text}", "{user}"), "{text}: {user}");
    }

    #[test]
    fn test_system_prompt_members() {
        let config = PersonaConfig {
            system_text: "You chat with:\n{members}Be brief.".to_string(),
            ..Default::default()
        };
        let prompt = config.system_prompt(&["alice".to_string(), "bob".to_string()]);
        assert_eq!(prompt, "You chat with:\n- alice\n- bob\nBe brief.");
    }

    #[test]
    fn test_render_unknown_placeholder_kept() {
        assert_eq!(render("{a} {b} {", &[("a", "1")]), "1 {b} {");
    }

    #[test]
    fn test_summary_context() {
        let config = PersonaConfig::default();
        assert!(config.summary_context("cats").ends_with("\ncats"));
    }

    #[test]
    fn test_validate() {
        assert!(PersonaConfig::default().validate().is_ok());

        let empty_name = PersonaConfig {
            name: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(empty_name.validate(), Err(Error::Config(_))));

        let hot = PersonaConfig {
            temperature: Some(3.0),
            ..Default::default()
        };
        assert!(hot.validate().is_err());

        let system_seed = PersonaConfig {
            init_conversations: vec![SeedTurn {
                role: Role::System,
                content: "x".to_string(),
            }],
            ..Default::default()
        };
        assert!(system_seed.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PersonaConfig = serde_json::from_str(
            r#"{"name": "nyao", "init_conversations": [{"role": "user", "content": "hi"}]}"#,
        )
        .unwrap();
        assert_eq!(config.name, "nyao");
        assert_eq!(config.text_format, "{user}: {text}");
        assert_eq!(config.init_conversations[0].role, Role::User);
    }
}
