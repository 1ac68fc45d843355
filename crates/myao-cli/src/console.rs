//! Console transport: stdin lines in, replies on stdout

use std::path::Path;

use async_trait::async_trait;
use myao_agent::{
    Attachment, AttachmentFetcher, Dispatch, InboundEvent, Orchestrator, OutboundReply, ReplySink,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

/// Channel id used for console events
pub const CONSOLE_CHANNEL: &str = "console";

/// Turn one input line into an event. `img:<path-or-url>` tokens become
/// attachments and are removed from the text.
pub fn parse_line(line: &str, author_id: &str) -> InboundEvent {
    let mut words = Vec::new();
    let mut attachments = Vec::new();

    for word in line.split_whitespace() {
        match word.strip_prefix("img:").filter(|loc| !loc.is_empty()) {
            Some(location) => attachments.push(Attachment {
                url: location.to_string(),
                mime_type: guess_mime_type(location).to_string(),
            }),
            None => words.push(word),
        }
    }

    InboundEvent {
        author_id: author_id.to_string(),
        author_is_bot: false,
        text: words.join(" "),
        channel_id: CONSOLE_CHANNEL.to_string(),
        thread_id: None,
        attachments,
    }
}

fn guess_mime_type(location: &str) -> &'static str {
    let ext = Path::new(location.split(['?', '#']).next().unwrap_or(location))
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Prints replies to stdout
pub struct ConsoleSink {
    name: String,
}

impl ConsoleSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ReplySink for ConsoleSink {
    async fn post(&self, reply: OutboundReply) -> myao_agent::Result<()> {
        println!("{}> {}", self.name, reply.text);
        Ok(())
    }
}

/// Fetches `http(s)` URLs over the network and anything else from disk
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttachmentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> myao_agent::Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| fetch_error(url, e))?;
            let bytes = response.bytes().await.map_err(|e| fetch_error(url, e))?;
            Ok(bytes.to_vec())
        } else {
            tokio::fs::read(url).await.map_err(|e| fetch_error(url, e))
        }
    }
}

fn fetch_error(url: &str, e: impl std::fmt::Display) -> myao_agent::Error {
    myao_agent::Error::Transport(format!("{}: {}", url, e))
}

/// Feed stdin lines to the orchestrator until EOF or Ctrl-C
pub async fn run(orchestrator: &Orchestrator, author_id: &str) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_task: Option<JoinHandle<()>> = None;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                orchestrator.scheduler().cancel();
                return Ok(());
            }
        };

        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match orchestrator.handle(parse_line(&line, author_id)).await? {
            Dispatch::Scheduled { id, delay, task } => {
                tracing::debug!(%id, delay_ms = delay.as_millis() as u64, "waiting to reply");
                last_task = Some(task);
            }
            Dispatch::Command(command) => {
                tracing::debug!(?command, "command handled");
            }
            Dispatch::Ignored(reason) => {
                tracing::debug!(?reason, "message ignored");
            }
        }
    }

    // Input closed: let the newest pending reply finish
    if let Some(task) = last_task {
        tokio::select! {
            result = task => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "reply task failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                orchestrator.scheduler().cancel();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_plain() {
        let event = parse_line("  hello   myao ", "U1");
        assert_eq!(event.text, "hello myao");
        assert_eq!(event.author_id, "U1");
        assert_eq!(event.channel_id, CONSOLE_CHANNEL);
        assert!(event.attachments.is_empty());
    }

    #[test]
    fn test_parse_line_images() {
        let event = parse_line("what is img:cat.PNG this img:https://x/y.jpg?size=2 img:", "U1");
        assert_eq!(event.text, "what is this img:");
        assert_eq!(
            event.attachments,
            vec![
                Attachment {
                    url: "cat.PNG".to_string(),
                    mime_type: "image/png".to_string(),
                },
                Attachment {
                    url: "https://x/y.jpg?size=2".to_string(),
                    mime_type: "image/jpeg".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type("a.webp"), "image/webp");
        assert_eq!(guess_mime_type("a.gif#frag"), "image/gif");
        assert_eq!(guess_mime_type("notes.txt"), "application/octet-stream");
        assert_eq!(guess_mime_type("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.png");
        std::fs::write(&path, b"png").unwrap();

        let fetcher = HttpFetcher::new();
        let bytes = fetcher.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"png");

        let err = fetcher
            .fetch(dir.path().join("missing.png").to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, myao_agent::Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_url() {
        let err = HttpFetcher::new()
            .fetch("http://127.0.0.1:1/cat.png")
            .await
            .unwrap_err();
        assert!(matches!(err, myao_agent::Error::Transport(_)));
    }
}
