//! myao-agent: conversation runtime for chat personas
//!
//! This crate provides the bounded conversation memory, the debounce reply
//! scheduler, the persona variants and the orchestrator that connects them
//! to a chat transport.

pub mod commands;
pub mod compaction;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod persona;
pub mod scheduler;
pub mod summary;

#[cfg(test)]
mod testing;

pub use commands::BotCommand;
pub use compaction::{BudgetAction, CharEstimate, EvictionPolicy, TokenCounter};
pub use conversation::{Conversation, Turn};
pub use directory::{BotIdentity, UserDirectory};
pub use error::{Error, Result};
pub use memory::{Draft, Exchange, MemoryStore, ResetOutcome};
pub use orchestrator::{
    Attachment, AttachmentFetcher, Dispatch, IgnoreReason, InboundEvent, Orchestrator,
    OutboundReply, QueuedMessage, ReplySink,
};
pub use persona::{Character, DualAgent, Persona, PersonaConfig, SeedTurn, SingleAgent};
pub use scheduler::{DelayPolicy, ReplyScheduler, ReplyToken, ScheduledReply, WaitOutcome};
pub use summary::SummaryStore;
