//! Scripted collaborators shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use myao_ai::{
    CompletionClient, CompletionRequest, CompletionResponse, Message, Usage,
    CONTEXT_LENGTH_EXCEEDED,
};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::orchestrator::{AttachmentFetcher, OutboundReply, ReplySink};

/// One scripted completion outcome
#[derive(Debug, Clone)]
pub enum Step {
    Reply {
        text: String,
        usage: Usage,
        delay: Duration,
    },
    /// `context_length_exceeded` API error
    Overflow,
    /// Generic server error
    Fail,
}

impl Step {
    pub fn reply(text: &str) -> Self {
        Self::reply_with_usage(text, 10)
    }

    pub fn reply_with_usage(text: &str, total: u32) -> Self {
        Step::Reply {
            text: text.to_string(),
            usage: Usage {
                prompt_tokens: total,
                completion_tokens: 0,
            },
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(delay: Duration, text: &str) -> Self {
        match Self::reply(text) {
            Step::Reply { text, usage, .. } => Step::Reply { text, usage, delay },
            other => other,
        }
    }
}

/// Completion client that plays back scripted steps.
///
/// Routes match on the system prompt and are reused on every call;
/// otherwise steps are consumed in order, falling back to an "ok" reply.
#[derive(Default)]
pub struct MockClient {
    steps: Mutex<VecDeque<Step>>,
    routes: Vec<(String, Step)>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(self, step: Step) -> Self {
        self.steps.lock().push_back(step);
        self
    }

    /// Answer every request whose system prompt contains `needle` with `step`
    pub fn route(mut self, needle: &str, step: Step) -> Self {
        self.routes.push((needle.to_string(), step));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    fn next_step(&self, request: &CompletionRequest) -> Step {
        let system = request
            .messages
            .first()
            .map(|m| m.text())
            .unwrap_or_default();
        if let Some((_, step)) = self
            .routes
            .iter()
            .find(|(needle, _)| system.contains(needle.as_str()))
        {
            return step.clone();
        }
        self.steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| Step::reply("ok"))
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    async fn complete(&self, request: &CompletionRequest) -> myao_ai::Result<CompletionResponse> {
        self.requests.lock().push(request.clone());
        match self.next_step(request) {
            Step::Reply { text, usage, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(CompletionResponse {
                    message: Message::assistant(text),
                    usage,
                })
            }
            Step::Overflow => Err(myao_ai::Error::api(
                400,
                "invalid_request_error",
                "This model's maximum context length is 8192 tokens.",
            )
            .with_code(CONTEXT_LENGTH_EXCEEDED)),
            Step::Fail => Err(myao_ai::Error::api(500, "server_error", "boom")),
        }
    }
}

/// Sink that records every posted reply
#[derive(Default)]
pub struct RecordingSink {
    posted: Mutex<Vec<OutboundReply>>,
}

impl RecordingSink {
    pub fn posted(&self) -> Vec<OutboundReply> {
        self.posted.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.posted.lock().iter().map(|r| r.text.clone()).collect()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn post(&self, reply: OutboundReply) -> Result<()> {
        self.posted.lock().push(reply);
        Ok(())
    }
}

/// Fetcher backed by a fixed URL table
#[derive(Default)]
pub struct StaticFetcher {
    files: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub fn with(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }
}

#[async_trait]
impl AttachmentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("not found: {}", url)))
    }
}
