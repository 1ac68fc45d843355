//! Conversation state: turns and the running summary.

use std::collections::VecDeque;

use myao_ai::{Message, Role};

/// One message in a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    text: String,
    attachments: Vec<String>,
    summary: bool,
    /// Append order within its conversation
    seq: u64,
}

impl Turn {
    /// Create a turn with image attachments given as data URLs
    pub fn new(role: Role, text: impl Into<String>, attachments: Vec<String>) -> Self {
        Self {
            role,
            text: text.into(),
            attachments,
            summary: false,
            seq: 0,
        }
    }

    /// Create a text-only turn
    pub fn text_only(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, text, Vec::new())
    }

    /// Create the assistant turn that carries a conversation summary
    pub fn summary(text: impl Into<String>) -> Self {
        Self {
            summary: true,
            ..Self::text_only(Role::Assistant, text)
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attachments(&self) -> &[String] {
        &self.attachments
    }

    /// Whether this turn holds a summary snapshot
    pub fn is_summary(&self) -> bool {
        self.summary
    }

    /// Convert to a wire message, text part first
    pub fn to_message(&self) -> Message {
        Message::with_images(self.role, &self.text, &self.attachments)
    }
}

/// Marks the turns present at one point in time. Turns appended later are
/// not covered, and evictions do not shift it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(u64);

/// Turns in chronological order plus the running summary.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: VecDeque<Turn>,
    next_seq: u64,
    /// Latest summary snapshot, if any
    pub running_summary: Option<String>,
}

impl Conversation {
    /// Conversation turns, oldest first
    pub fn turns(&self) -> &VecDeque<Turn> {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a turn at the end
    pub fn push(&mut self, mut turn: Turn) {
        turn.seq = self.next_seq;
        self.next_seq += 1;
        self.turns.push_back(turn);
    }

    /// Covers every turn stored so far
    pub fn mark(&self) -> Mark {
        Mark(self.next_seq)
    }

    /// Drop the oldest `n` turns, clamped to the current length.
    /// Returns how many turns were dropped.
    pub fn evict(&mut self, n: usize) -> usize {
        let n = n.min(self.turns.len());
        self.turns.drain(..n);
        n
    }

    /// Whether the summary seed turn is still part of the history
    pub fn summary_turn_live(&self) -> bool {
        self.turns.iter().any(Turn::is_summary)
    }

    /// Replace the turns covered by `mark` with a single summary turn.
    /// Turns appended after the mark stay, after the summary.
    /// Returns how many turns were replaced.
    pub fn replace_with_summary(&mut self, mark: Mark, summary: &str) -> usize {
        let covered = self.turns.iter().take_while(|t| t.seq < mark.0).count();
        self.turns.drain(..covered);

        let mut turn = Turn::summary(summary);
        turn.seq = self.next_seq;
        self.next_seq += 1;
        self.turns.push_front(turn);
        self.running_summary = Some(summary.to_string());
        covered
    }
}
