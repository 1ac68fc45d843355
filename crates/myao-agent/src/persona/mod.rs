//! Personas: the bots the orchestrator talks through.
//!
//! `Persona` is the capability the orchestrator needs. The concrete set is
//! closed: a memory-backed [`SingleAgent`] or a [`DualAgent`] that pairs a
//! primary persona with a stateless corrector.

mod config;
mod dual;
mod single;

pub use config::{PersonaConfig, SeedTurn};
pub use dual::{DualAgent, compose_reply};
pub use single::SingleAgent;

use async_trait::async_trait;
use myao_ai::Role;

use crate::error::Result;
use crate::memory::ResetOutcome;
use crate::scheduler::ReplyToken;

#[async_trait]
pub trait Persona: Send + Sync {
    /// Display name, also used to detect being addressed
    fn name(&self) -> &str;

    /// Attribute a message to its author
    fn format_text(&self, user: &str, text: &str) -> String;

    /// Store a turn without asking for a reply
    fn remember(&self, role: Role, text: &str, attachments: Vec<String>);

    /// Produce a reply and store the exchange, claiming `token`.
    /// `Error::Cancelled` if superseded first; nothing is stored then.
    async fn reply(
        &self,
        text: &str,
        attachments: Vec<String>,
        token: &ReplyToken,
    ) -> Result<String>;

    /// Summarize and replace the memory
    async fn reset(&self) -> Result<ResetOutcome>;

    /// Text posted when the backend fails
    fn error_text(&self) -> &str;
}

/// The closed set of persona variants
pub enum Character {
    Single(SingleAgent),
    Dual(DualAgent),
}

impl Character {
    fn inner(&self) -> &dyn Persona {
        match self {
            Character::Single(agent) => agent,
            Character::Dual(agent) => agent,
        }
    }
}

#[async_trait]
impl Persona for Character {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn format_text(&self, user: &str, text: &str) -> String {
        self.inner().format_text(user, text)
    }

    fn remember(&self, role: Role, text: &str, attachments: Vec<String>) {
        self.inner().remember(role, text, attachments)
    }

    async fn reply(
        &self,
        text: &str,
        attachments: Vec<String>,
        token: &ReplyToken,
    ) -> Result<String> {
        self.inner().reply(text, attachments, token).await
    }

    async fn reset(&self) -> Result<ResetOutcome> {
        self.inner().reset().await
    }

    fn error_text(&self) -> &str {
        self.inner().error_text()
    }
}

impl From<SingleAgent> for Character {
    fn from(agent: SingleAgent) -> Self {
        Character::Single(agent)
    }
}

impl From<DualAgent> for Character {
    fn from(agent: DualAgent) -> Self {
        Character::Dual(agent)
    }
}
