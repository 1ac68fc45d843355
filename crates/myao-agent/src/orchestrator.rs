//! Conversation orchestrator: turns inbound chat events into replies.
//!
//! Each accepted event supersedes the pending reply, waits out its delay in a
//! spawned task, and posts the persona's answer back to the event's thread.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use myao_ai::{Role, data_url};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::commands::{BotCommand, help_message};
use crate::directory::{BotIdentity, UserDirectory};
use crate::error::{Error, Result};
use crate::persona::Persona;
use crate::scheduler::{DelayPolicy, ReplyScheduler, ScheduledReply, WaitOutcome};

/// Image types forwarded to the model
const IMAGE_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// A file attached to an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub mime_type: String,
}

/// A message event from the transport
#[derive(Debug, Clone, Default)]
pub struct InboundEvent {
    pub author_id: String,
    pub author_is_bot: bool,
    pub text: String,
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// A formatted message waiting for its reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub text: String,
    /// Images as data URLs
    pub images: Vec<String>,
}

/// A message to post back to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub text: String,
}

/// Where replies are posted
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn post(&self, reply: OutboundReply) -> Result<()>;
}

/// Downloads attachment bytes
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    FromBot,
    FromSelf,
    EmptyText,
}

/// What the orchestrator did with an event
#[derive(Debug)]
pub enum Dispatch {
    Ignored(IgnoreReason),
    /// A command ran and its reply was posted
    Command(BotCommand),
    /// A reply task was spawned
    Scheduled {
        id: Uuid,
        delay: Duration,
        task: JoinHandle<()>,
    },
}

/// Reply destination taken from the inbound event
#[derive(Debug, Clone)]
struct Target {
    channel_id: String,
    thread_id: Option<String>,
}

impl Target {
    fn reply(&self, text: String) -> OutboundReply {
        OutboundReply {
            channel_id: self.channel_id.clone(),
            thread_id: self.thread_id.clone(),
            text,
        }
    }
}

pub struct Orchestrator {
    persona: Arc<dyn Persona>,
    sink: Arc<dyn ReplySink>,
    fetcher: Arc<dyn AttachmentFetcher>,
    directory: UserDirectory,
    bot: BotIdentity,
    scheduler: ReplyScheduler<QueuedMessage>,
    delays: DelayPolicy,
}

impl Orchestrator {
    pub fn new(
        persona: Arc<dyn Persona>,
        sink: Arc<dyn ReplySink>,
        fetcher: Arc<dyn AttachmentFetcher>,
        directory: UserDirectory,
        bot: BotIdentity,
    ) -> Self {
        Self {
            persona,
            sink,
            fetcher,
            directory,
            bot,
            scheduler: ReplyScheduler::new(),
            delays: DelayPolicy::default(),
        }
    }

    pub fn with_delay_policy(mut self, delays: DelayPolicy) -> Self {
        self.delays = delays;
        self
    }

    pub fn scheduler(&self) -> &ReplyScheduler<QueuedMessage> {
        &self.scheduler
    }

    /// Handle one inbound event. Events are expected one at a time, in
    /// arrival order; the returned task (if any) runs the reply.
    pub async fn handle(&self, event: InboundEvent) -> Result<Dispatch> {
        if event.author_is_bot {
            return Ok(Dispatch::Ignored(IgnoreReason::FromBot));
        }
        if event.author_id == self.bot.user_id {
            return Ok(Dispatch::Ignored(IgnoreReason::FromSelf));
        }
        if event.text.trim().is_empty() {
            return Ok(Dispatch::Ignored(IgnoreReason::EmptyText));
        }

        let target = Target {
            channel_id: event.channel_id.clone(),
            thread_id: event.thread_id.clone(),
        };
        let body = self
            .directory
            .resolve_mentions(&event.text, &self.bot, self.persona.name());
        let addressed =
            body.contains(self.persona.name()) || event.text.contains(&self.bot.mention());

        if addressed {
            if let Some(command) = BotCommand::parse(&event.text) {
                tracing::info!(?command, channel = %event.channel_id, "running command");
                self.run_command(command, &target).await;
                return Ok(Dispatch::Command(command));
            }
        }

        let text = match self.directory.name(&event.author_id) {
            Some(user) => self.persona.format_text(user, &body),
            None => body,
        };
        let images = self.load_images(&event.attachments).await;

        let delay = self.delays.delay_for(addressed);
        let (scheduled, superseded) = self
            .scheduler
            .schedule(delay, QueuedMessage { text, images });
        let id = scheduled.id();
        if let Some(message) = superseded {
            // stored before the newer reply can take its snapshot
            tracing::debug!(%id, "keeping superseded message");
            self.persona.remember(Role::User, &message.text, message.images);
        }
        tracing::info!(
            %id,
            addressed,
            delay_ms = delay.as_millis() as u64,
            images = scheduled.payload().images.len(),
            "reply scheduled"
        );

        let task = tokio::spawn(run_reply(
            Arc::clone(&self.persona),
            Arc::clone(&self.sink),
            scheduled,
            target,
        ));

        Ok(Dispatch::Scheduled { id, delay, task })
    }

    async fn run_command(&self, command: BotCommand, target: &Target) {
        let text = match command {
            BotCommand::Help => help_message().to_string(),
            BotCommand::Reset => match self.persona.reset().await {
                Ok(outcome) => match outcome.persist_error {
                    None => outcome.summary,
                    Some(e) => format!(
                        "{}\n\n(warning: the summary could not be saved: {})",
                        outcome.summary, e
                    ),
                },
                Err(e) => {
                    tracing::error!(error = %e, "reset failed");
                    self.persona.error_text().to_string()
                }
            },
        };
        post(self.sink.as_ref(), target.reply(text)).await;
    }

    /// Fetch supported images as data URLs, skipping anything that fails
    async fn load_images(&self, attachments: &[Attachment]) -> Vec<String> {
        let mut urls = Vec::new();
        for attachment in attachments {
            let mime = attachment.mime_type.to_ascii_lowercase();
            if !IMAGE_MIME_TYPES.contains(&mime.as_str()) {
                tracing::debug!(url = %attachment.url, mime = %mime, "ignoring non-image attachment");
                continue;
            }
            match self.fetcher.fetch(&attachment.url).await {
                Ok(bytes) => urls.push(data_url(&mime, &bytes)),
                Err(e) => {
                    tracing::warn!(url = %attachment.url, error = %e, "failed to fetch attachment");
                }
            }
        }
        urls
    }
}

/// Superseded replies leave their message to the newer reply's `handle`
async fn run_reply(
    persona: Arc<dyn Persona>,
    sink: Arc<dyn ReplySink>,
    scheduled: ScheduledReply<QueuedMessage>,
    target: Target,
) {
    let id = scheduled.id();
    if scheduled.wait().await == WaitOutcome::Cancelled {
        tracing::debug!(%id, "reply superseded before firing");
        return;
    }

    let message = scheduled.payload();
    match persona
        .reply(&message.text, message.images.clone(), scheduled.token())
        .await
    {
        Ok(reply) => {
            tracing::info!(%id, chars = reply.len(), "posting reply");
            post(sink.as_ref(), target.reply(reply)).await;
        }
        Err(Error::Cancelled) => {
            tracing::debug!(%id, "reply superseded in flight");
        }
        Err(e) if scheduled.token().claim() => {
            tracing::error!(%id, error = %e, "reply failed");
            post(sink.as_ref(), target.reply(persona.error_text().to_string())).await;
        }
        Err(e) => {
            tracing::debug!(%id, error = %e, "reply failed after being superseded");
        }
    }
}

async fn post(sink: &dyn ReplySink, reply: OutboundReply) {
    if let Err(e) = sink.post(reply).await {
        tracing::error!(error = %e, "failed to post reply");
    }
}
