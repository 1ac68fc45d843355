use async_trait::async_trait;
use myao_ai::Role;

use super::{Persona, SingleAgent};
use crate::error::{Error, Result};
use crate::memory::ResetOutcome;
use crate::scheduler::ReplyToken;

/// Primary persona plus a corrector that annotates every reply.
///
/// The corrector sees only its own system prompt, seed turns and the current
/// message; its output is never remembered.
pub struct DualAgent {
    primary: SingleAgent,
    corrector: SingleAgent,
}

impl DualAgent {
    pub fn new(primary: SingleAgent, corrector: SingleAgent) -> Self {
        Self { primary, corrector }
    }

    pub fn primary(&self) -> &SingleAgent {
        &self.primary
    }

    pub fn corrector(&self) -> &SingleAgent {
        &self.corrector
    }
}

/// Append the correction as a quoted block under the primary reply
pub fn compose_reply(primary: &str, correction: &str) -> String {
    let mut out = String::with_capacity(primary.len() + correction.len() + 32);
    out.push_str(primary);
    out.push_str("\n\n> *Correction*");
    for line in correction.split('\n') {
        out.push_str("\n> ");
        out.push_str(line);
    }
    out
}

#[async_trait]
impl Persona for DualAgent {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn format_text(&self, user: &str, text: &str) -> String {
        self.primary.format_text(user, text)
    }

    fn remember(&self, role: Role, text: &str, attachments: Vec<String>) {
        self.primary.remember(role, text, attachments);
    }

    async fn reply(
        &self,
        text: &str,
        attachments: Vec<String>,
        token: &ReplyToken,
    ) -> Result<String> {
        let (primary, correction) = tokio::join!(
            self.primary.memory().request(text, attachments.clone(), token),
            self.corrector.ask(text, attachments, token),
        );

        if matches!(primary, Err(Error::Cancelled)) || matches!(correction, Err(Error::Cancelled))
        {
            return Err(Error::Cancelled);
        }

        // the primary exchange is stored only once both flows are done
        let primary = match primary {
            Ok(draft) => {
                let exchange = self.primary.memory().commit(draft, token)?;
                self.primary.after_exchange(exchange)
            }
            Err(e) => {
                if !token.claim() {
                    return Err(Error::Cancelled);
                }
                tracing::warn!(persona = %self.primary.name(), error = %e, "primary reply failed");
                self.primary.error_text().to_string()
            }
        };
        let correction = correction.unwrap_or_else(|e| {
            tracing::warn!(persona = %self.corrector.name(), error = %e, "correction failed");
            self.corrector.error_text().to_string()
        });

        Ok(compose_reply(&primary, &correction))
    }

    async fn reset(&self) -> Result<ResetOutcome> {
        self.primary.reset().await
    }

    fn error_text(&self) -> &str {
        self.primary.error_text()
    }
}
