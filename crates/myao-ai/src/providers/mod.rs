//! Completion backend implementations

pub mod openai;

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A stateless request/response completion backend.
///
/// Implementations issue exactly one exchange per call and never retry on
/// their own; callers decide what to do with usage and error codes.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the request and return the first choice
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}
