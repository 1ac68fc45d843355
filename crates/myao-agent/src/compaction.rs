//! Memory budget policy for long conversations
//!
//! When a reply reports more tokens than the budget allows, the oldest turns
//! are either dropped or folded into a summary. This module holds the policy
//! knobs and the token estimates used to decide how much to drop.

use myao_ai::{Content, Message};
use serde::{Deserialize, Serialize};

/// Default token budget (two 8096-token windows)
pub const DEFAULT_BUDGET_TOKENS: u32 = 2 * 8096;

/// What to do when a reply pushes the conversation over budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetAction {
    /// Drop the oldest turns until the estimate fits
    #[default]
    Evict,
    /// Summarize the whole conversation in the background
    Summarize,
}

/// Eviction and summarization thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionPolicy {
    /// Reported usage above this triggers `on_budget_exceeded`
    pub budget_tokens: u32,
    /// Turns dropped when the backend rejects the prompt as too long
    pub overflow_evict: usize,
    /// Fewest turns dropped by a budget eviction
    pub min_evict: usize,
    /// Below this many turns the persona's init text is added to the system turn
    pub init_threshold: usize,
    /// Action taken when over budget
    pub on_budget_exceeded: BudgetAction,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            budget_tokens: DEFAULT_BUDGET_TOKENS,
            overflow_evict: 8,
            min_evict: 3,
            init_threshold: 15,
            on_budget_exceeded: BudgetAction::Evict,
        }
    }
}

impl EvictionPolicy {
    /// How many of the oldest `turns` to drop so that the system turn plus
    /// the remaining turns fit in the budget. Never less than `min_evict`
    /// (clamped to the number of turns).
    ///
    /// `system` builds the system turn that would go with the history after
    /// dropping `n` turns, since its text depends on what remains.
    pub fn turns_to_evict(
        &self,
        counter: &dyn TokenCounter,
        turns: &[Message],
        system: impl Fn(usize) -> Message,
    ) -> usize {
        let costs: Vec<u32> = turns.iter().map(|m| counter.count(m)).collect();
        let mut remaining: u32 = costs.iter().sum();

        let mut n = self.min_evict.min(turns.len());
        remaining -= costs[..n].iter().sum::<u32>();
        while n < turns.len() && counter.count(&system(n)) + remaining > self.budget_tokens {
            remaining -= costs[n];
            n += 1;
        }
        n
    }
}

/// Estimates the prompt cost of a message
pub trait TokenCounter: Send + Sync {
    fn count(&self, message: &Message) -> u32;
}

/// chars/4 heuristic with a flat cost per image
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimate;

impl TokenCounter for CharEstimate {
    fn count(&self, message: &Message) -> u32 {
        estimate_tokens(message)
    }
}

/// Estimate token count for a single message (chars/4 heuristic)
pub fn estimate_tokens(message: &Message) -> u32 {
    let char_count: usize = message
        .content
        .iter()
        .map(|c| match c {
            Content::Text { text } => text.len(),
            Content::ImageUrl { .. } => 4800, // ~1200 tokens * 4 chars/token
        })
        .sum();
    (char_count / 4) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use myao_ai::Role;

    /// Every message costs the same
    struct Flat(u32);

    impl TokenCounter for Flat {
        fn count(&self, _message: &Message) -> u32 {
            self.0
        }
    }

    fn turns(n: usize) -> Vec<Message> {
        (0..n).map(|i| Message::user(format!("m{}", i))).collect()
    }

    /// `n` turns of 100 estimated tokens each
    fn flat_turns(n: usize) -> Vec<Message> {
        (0..n).map(|_| Message::user("x".repeat(400))).collect()
    }

    #[test]
    fn test_estimate_tokens_text() {
        let msg = Message::user("Hello world!"); // 12 chars -> 3 tokens
        assert_eq!(estimate_tokens(&msg), 3);
    }

    #[test]
    fn test_estimate_tokens_image() {
        let msg = Message::with_images(Role::User, "", &["data:image/png;base64,AA==".into()]);
        assert_eq!(estimate_tokens(&msg), 1200);
    }

    #[test]
    fn test_turns_to_evict_until_fits() {
        let policy = EvictionPolicy {
            budget_tokens: 1000,
            min_evict: 3,
            ..Default::default()
        };
        // system 100 + 20 turns * 100 = 2100; need to get to <= 1000 -> keep 9 turns
        let n = policy.turns_to_evict(&Flat(100), &turns(20), |_| Message::system("s"));
        assert_eq!(n, 11);
    }

    #[test]
    fn test_turns_to_evict_respects_minimum() {
        let policy = EvictionPolicy {
            budget_tokens: 10_000,
            min_evict: 3,
            ..Default::default()
        };
        let n = policy.turns_to_evict(&Flat(10), &turns(6), |_| Message::system("s"));
        assert_eq!(n, 3);
    }

    #[test]
    fn test_turns_to_evict_clamped_to_len() {
        let policy = EvictionPolicy {
            budget_tokens: 0,
            min_evict: 3,
            ..Default::default()
        };
        assert_eq!(
            policy.turns_to_evict(&Flat(10), &turns(2), |_| Message::system("s")),
            2
        );
        assert_eq!(
            policy.turns_to_evict(&Flat(10), &turns(5), |_| Message::system("s")),
            5
        );
    }

    #[test]
    fn test_turns_to_evict_counts_growing_system_turn() {
        let policy = EvictionPolicy {
            budget_tokens: 1000,
            min_evict: 3,
            ..Default::default()
        };
        // the system turn grows to 500 tokens once fewer than 12 turns remain
        let system = |n: usize| {
            let text = if 20 - n < 12 { "s".repeat(2000) } else { "s".to_string() };
            Message::system(text)
        };
        let n = policy.turns_to_evict(&CharEstimate, &flat_turns(20), system);
        assert_eq!(n, 15);
    }

    #[test]
    fn test_policy_deserialize_defaults() {
        let policy: EvictionPolicy = serde_json::from_str(r#"{"on_budget_exceeded":"summarize"}"#).unwrap();
        assert_eq!(policy.budget_tokens, DEFAULT_BUDGET_TOKENS);
        assert_eq!(policy.overflow_evict, 8);
        assert_eq!(policy.on_budget_exceeded, BudgetAction::Summarize);
    }
}
