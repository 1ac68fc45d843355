//! myao-ai: chat completion client layer
//!
//! This crate defines the request/response types shared with the agent runtime
//! and a stateless OpenAI-compatible completion client.

pub mod error;
pub mod providers;
pub mod types;

pub use error::{CONTEXT_LENGTH_EXCEEDED, Error, Result};
pub use providers::CompletionClient;
pub use types::*;
