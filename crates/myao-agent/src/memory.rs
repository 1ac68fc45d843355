//! Bounded conversation memory for a single persona.
//!
//! The store owns the turn list, builds prompts from it, and talks to the
//! completion client. All mutation happens under one `RwLock`, which is never
//! held across an await point.

use std::sync::Arc;

use myao_ai::{CompletionClient, CompletionRequest, Message, Role, Usage};
use parking_lot::RwLock;

use crate::compaction::{BudgetAction, CharEstimate, EvictionPolicy, TokenCounter};
use crate::conversation::{Conversation, Turn};
use crate::error::{Error, Result};
use crate::persona::PersonaConfig;
use crate::scheduler::ReplyToken;
use crate::summary::SummaryStore;

/// A reply from the backend that has not been stored yet
#[derive(Debug, Clone)]
pub struct Draft {
    user: Turn,
    reply: String,
    usage: Usage,
}

impl Draft {
    pub fn reply(&self) -> &str {
        &self.reply
    }
}

/// Result of a successful reply cycle
#[derive(Debug, Clone)]
pub struct Exchange {
    pub reply: String,
    pub usage: Usage,
    /// The budget was exceeded and the policy asks for a background summary
    pub needs_summary: bool,
}

/// Result of a summarizing reset
#[derive(Debug)]
pub struct ResetOutcome {
    pub summary: String,
    /// Set when the summary could not be written to disk
    pub persist_error: Option<Error>,
}

pub struct MemoryStore {
    persona: PersonaConfig,
    system_prompt: String,
    model: String,
    client: Arc<dyn CompletionClient>,
    policy: EvictionPolicy,
    counter: Arc<dyn TokenCounter>,
    summary_store: Option<Arc<SummaryStore>>,
    state: RwLock<Conversation>,
    reset_guard: tokio::sync::Mutex<()>,
}

impl MemoryStore {
    /// Create a store seeded with the persona's seed conversation
    pub fn new(
        persona: PersonaConfig,
        model: impl Into<String>,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        let mut state = Conversation::default();
        for seed in &persona.init_conversations {
            state.push(Turn::text_only(seed.role, seed.content.clone()));
        }

        Self {
            system_prompt: persona.system_prompt(&[]),
            persona,
            model: model.into(),
            client,
            policy: EvictionPolicy::default(),
            counter: Arc::new(CharEstimate),
            summary_store: None,
            state: RwLock::new(state),
            reset_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Fill `{members}` in the system prompt
    pub fn with_members(mut self, members: &[String]) -> Self {
        self.system_prompt = self.persona.system_prompt(members);
        self
    }

    pub fn with_policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// Attach a summary file. A stored summary becomes an assistant seed turn;
    /// a failed load is logged and the store starts without one.
    pub fn with_summary_store(mut self, store: Arc<SummaryStore>) -> Self {
        match store.load() {
            Ok(Some(summary)) => {
                tracing::info!(path = %store.path().display(), "loaded conversation summary");
                let state = self.state.get_mut();
                state.push(Turn::summary(summary.clone()));
                state.running_summary = Some(summary);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %store.path().display(), error = %e, "failed to load summary");
            }
        }
        self.summary_store = Some(store);
        self
    }

    pub fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Append a turn
    pub fn remember(&self, role: Role, text: impl Into<String>, attachments: Vec<String>) {
        let mut state = self.state.write();
        state.push(Turn::new(role, text, attachments));
        tracing::debug!(turns = state.len(), "remembered turn");
    }

    /// Prompt for the next request: system turn first, then every stored turn
    pub fn snapshot(&self) -> Vec<Message> {
        self.prompt(&self.state.read())
    }

    /// Drop the oldest `n` turns; returns how many were dropped
    pub fn evict(&self, n: usize) -> usize {
        let dropped = self.state.write().evict(n);
        tracing::info!(requested = n, dropped, "evicted old turns");
        dropped
    }

    /// Copy of the stored turns, oldest first
    pub fn turns(&self) -> Vec<Turn> {
        self.state.read().turns().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn running_summary(&self) -> Option<String> {
        self.state.read().running_summary.clone()
    }

    fn prompt(&self, state: &Conversation) -> Vec<Message> {
        let mut messages = Vec::with_capacity(state.len() + 1);
        messages.push(Message::system(self.system_text(state, 0)));
        messages.extend(state.turns().iter().map(Turn::to_message));
        messages
    }

    /// System text for the history left after dropping the oldest `skip` turns
    fn system_text(&self, state: &Conversation, skip: usize) -> String {
        if state.len().saturating_sub(skip) < self.policy.init_threshold {
            return format!("{}{}", self.system_prompt, self.persona.init_text);
        }
        let summary_live = state.turns().iter().skip(skip).any(Turn::is_summary);
        match state.running_summary {
            Some(ref summary) if !summary_live => format!(
                "{}{}",
                self.system_prompt,
                self.persona.summary_context(summary)
            ),
            _ => self.system_prompt.clone(),
        }
    }

    /// Send the snapshot plus a new user turn and store both on success.
    pub async fn reply(
        &self,
        text: &str,
        attachments: Vec<String>,
        token: &ReplyToken,
    ) -> Result<Exchange> {
        let draft = self.request(text, attachments, token).await?;
        self.commit(draft, token)
    }

    /// Send the snapshot plus a new user turn without storing anything.
    ///
    /// Cancellation discards the request. A context overflow evicts the
    /// oldest turns before the error is returned.
    pub async fn request(
        &self,
        text: &str,
        attachments: Vec<String>,
        token: &ReplyToken,
    ) -> Result<Draft> {
        let user = Turn::new(Role::User, text, attachments);
        let mut messages = self.snapshot();
        messages.push(user.to_message());
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.persona.temperature,
        };

        tracing::debug!(persona = %self.persona.name, messages = request.messages.len(), "requesting reply");

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(persona = %self.persona.name, "reply cancelled in flight");
                return Err(Error::Cancelled);
            }
            result = self.client.complete(&request) => result,
        };

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_context_overflow() => {
                tracing::warn!(persona = %self.persona.name, error = %e, "context length exceeded");
                self.evict(self.policy.overflow_evict);
                return Err(e.into());
            }
            Err(e) => {
                tracing::error!(persona = %self.persona.name, error = %e, "completion failed");
                return Err(e.into());
            }
        };

        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        Ok(Draft {
            user,
            reply: response.message.text(),
            usage: response.usage,
        })
    }

    /// Store the user turn and the reply, then apply the budget policy.
    /// Nothing is stored if `token` was superseded first.
    pub fn commit(&self, draft: Draft, token: &ReplyToken) -> Result<Exchange> {
        let Draft { user, reply, usage } = draft;
        let needs_summary = token
            .claim_with(|| {
                let mut state = self.state.write();
                state.push(user);
                state.push(Turn::text_only(Role::Assistant, reply.clone()));
                self.apply_budget(&mut state, usage)
            })
            .ok_or_else(|| {
                tracing::debug!(persona = %self.persona.name, "reply superseded before commit");
                Error::Cancelled
            })?;

        Ok(Exchange {
            reply,
            usage,
            needs_summary,
        })
    }

    /// One-off request against the current snapshot. Nothing is remembered.
    pub async fn ask(
        &self,
        text: &str,
        attachments: Vec<String>,
        token: &ReplyToken,
    ) -> Result<String> {
        let mut messages = self.snapshot();
        messages.push(Message::with_images(Role::User, text, &attachments));
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.persona.temperature,
        };

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled),
            result = self.client.complete(&request) => result?,
        };
        Ok(response.message.text())
    }

    /// Returns true when a background summary should be started
    fn apply_budget(&self, state: &mut Conversation, usage: Usage) -> bool {
        if usage.total() <= self.policy.budget_tokens {
            return false;
        }

        match self.policy.on_budget_exceeded {
            BudgetAction::Evict => {
                let turns: Vec<Message> = state.turns().iter().map(Turn::to_message).collect();
                let n = self.policy.turns_to_evict(self.counter.as_ref(), &turns, |n| {
                    Message::system(self.system_text(state, n))
                });
                let dropped = state.evict(n);
                tracing::info!(
                    usage = usage.total(),
                    budget = self.policy.budget_tokens,
                    dropped,
                    "over token budget, evicted old turns"
                );
                false
            }
            BudgetAction::Summarize => {
                tracing::info!(
                    usage = usage.total(),
                    budget = self.policy.budget_tokens,
                    "over token budget, summary needed"
                );
                true
            }
        }
    }

    /// Summarize the conversation and replace the summarized turns with the
    /// summary. Waits for any reset already in progress.
    pub async fn reset_with_summary(&self) -> Result<ResetOutcome> {
        let _guard = self.reset_guard.lock().await;
        self.summarize_and_replace().await
    }

    /// Like `reset_with_summary`, but gives up if another reset is running
    pub async fn try_reset_with_summary(&self) -> Result<ResetOutcome> {
        let _guard = self
            .reset_guard
            .try_lock()
            .map_err(|_| Error::ResetInProgress)?;
        self.summarize_and_replace().await
    }

    async fn summarize_and_replace(&self) -> Result<ResetOutcome> {
        let (mut messages, mark) = {
            let state = self.state.read();
            (self.prompt(&state), state.mark())
        };
        messages.push(Message::user(self.persona.summary_text.clone()));
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.0),
        };

        let response = self.client.complete(&request).await.map_err(|e| {
            tracing::error!(persona = %self.persona.name, error = %e, "summary request failed");
            e
        })?;
        let summary = response.message.text();

        let persist_error = match self.summary_store {
            Some(ref store) => store.save(&summary).err(),
            None => None,
        };
        if let Some(ref e) = persist_error {
            tracing::warn!(persona = %self.persona.name, error = %e, "failed to save summary");
        }

        // turns stored while the summary was requested stay after it
        let (replaced, kept) = {
            let mut state = self.state.write();
            let replaced = state.replace_with_summary(mark, &summary);
            (replaced, state.len() - 1)
        };
        tracing::info!(
            persona = %self.persona.name,
            chars = summary.len(),
            replaced,
            kept,
            "memory reset with summary"
        );

        Ok(ResetOutcome {
            summary,
            persist_error,
        })
    }
}
