use std::sync::Arc;

use async_trait::async_trait;
use myao_ai::Role;

use super::Persona;
use crate::error::{Error, Result};
use crate::memory::{Exchange, MemoryStore, ResetOutcome};
use crate::scheduler::ReplyToken;

/// A persona backed by one memory store
pub struct SingleAgent {
    memory: Arc<MemoryStore>,
}

impl SingleAgent {
    pub fn new(memory: MemoryStore) -> Self {
        Self {
            memory: Arc::new(memory),
        }
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Reply from the current memory without remembering anything
    pub async fn ask(
        &self,
        text: &str,
        attachments: Vec<String>,
        token: &ReplyToken,
    ) -> Result<String> {
        self.memory.ask(text, attachments, token).await
    }

    /// Start a background summary if the exchange went over budget
    pub(crate) fn after_exchange(&self, exchange: Exchange) -> String {
        if exchange.needs_summary {
            self.spawn_summary();
        }
        exchange.reply
    }

    fn spawn_summary(&self) {
        let memory = Arc::clone(&self.memory);
        tokio::spawn(async move {
            match memory.try_reset_with_summary().await {
                Ok(outcome) => {
                    tracing::info!(chars = outcome.summary.len(), "background summary finished");
                }
                Err(Error::ResetInProgress) => {
                    tracing::debug!("background summary skipped, reset already running");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "background summary failed");
                }
            }
        });
    }
}

#[async_trait]
impl Persona for SingleAgent {
    fn name(&self) -> &str {
        &self.memory.persona().name
    }

    fn format_text(&self, user: &str, text: &str) -> String {
        self.memory.persona().format_text(user, text)
    }

    fn remember(&self, role: Role, text: &str, attachments: Vec<String>) {
        self.memory.remember(role, text, attachments);
    }

    async fn reply(
        &self,
        text: &str,
        attachments: Vec<String>,
        token: &ReplyToken,
    ) -> Result<String> {
        let exchange = self.memory.reply(text, attachments, token).await?;
        Ok(self.after_exchange(exchange))
    }

    async fn reset(&self) -> Result<ResetOutcome> {
        self.memory.reset_with_summary().await
    }

    fn error_text(&self) -> &str {
        &self.memory.persona().error_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compaction::{BudgetAction, EvictionPolicy};
    use crate::persona::PersonaConfig;
    use crate::testing::{MockClient, Step};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_over_budget_summarizes_in_background() {
        let client = Arc::new(
            MockClient::new()
                .step(Step::reply_with_usage("sure", 50_000))
                .step(Step::reply("the summary")),
        );
        let memory = MemoryStore::new(PersonaConfig::default(), "gpt-4o", client.clone())
            .with_policy(EvictionPolicy {
                on_budget_exceeded: BudgetAction::Summarize,
                ..Default::default()
            });
        let agent = SingleAgent::new(memory);

        let reply = agent
            .reply("hello", Vec::new(), &ReplyToken::new())
            .await
            .unwrap();
        assert_eq!(reply, "sure");

        tokio::time::sleep(Duration::from_millis(10)).await;
        let turns = agent.memory().turns();
        assert_eq!(turns.len(), 1);
        assert!(turns[0].is_summary());
        assert_eq!(client.requests().len(), 2);
    }

    #[test]
    fn test_persona_accessors() {
        let persona = PersonaConfig {
            name: "nyao".to_string(),
            error_text: "nyao?".to_string(),
            text_format: "[{user}] {text}".to_string(),
            ..Default::default()
        };
        let agent = SingleAgent::new(MemoryStore::new(
            persona,
            "gpt-4o",
            Arc::new(MockClient::new()),
        ));
        assert_eq!(agent.name(), "nyao");
        assert_eq!(agent.error_text(), "nyao?");
        assert_eq!(agent.format_text("bob", "hi"), "[bob] hi");

        agent.remember(Role::User, "hi", Vec::new());
        assert_eq!(agent.memory().len(), 1);
    }
}
